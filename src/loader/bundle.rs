use super::{ClassRegistry, LoadError};
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Symbol a native bundle exports to register its view classes
pub const REGISTER_VIEWS_SYMBOL: &str = "mpt_register_views";

/// Registration function of a bundle
pub type RegisterViews = fn(&mut ClassRegistry);

/// Entry point a native bundle exports. Returns `false` if registration panicked.
pub type NativeRegisterViews = fn(&mut ClassRegistry) -> bool;

/// Export a bundle's registration function under [`REGISTER_VIEWS_SYMBOL`].
///
/// ```rust,ignore
/// fn register(registry: &mut ClassRegistry) {
///     registry.register("com.example.qibla.CompassView", CompassView::construct);
/// }
///
/// mpt_extensions::export_views!(register);
/// ```
///
/// The bundle and the host must be built by the same compiler against the
/// same version of this crate.
#[macro_export]
macro_rules! export_views {
    ($register:path) => {
        #[no_mangle]
        pub fn mpt_register_views(registry: &mut $crate::loader::ClassRegistry) -> bool {
            // Panics must be caught by the bundle's own runtime
            ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $register(registry)))
                .is_ok()
        }
    };
}

/// Classes defined by one opened bundle.
///
/// Holds the bundle's library open for as long as the classes are reachable.
#[derive(Debug)]
pub struct OpenedBundle {
    classes: ClassRegistry,
    _library: Option<Library>,
}

impl OpenedBundle {
    pub fn from_registry(classes: ClassRegistry) -> Self {
        Self {
            classes,
            _library: None,
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }
}

/// Host primitive that opens a code bundle into a fresh class table
pub trait BundleOpener: Send + Sync {
    fn open(&self, bundle: &Path) -> Result<OpenedBundle, LoadError>;
}

/// Opens bundles that are platform dynamic libraries
#[derive(Debug, Default)]
pub struct NativeBundleOpener;

impl NativeBundleOpener {
    pub fn new() -> Self {
        Self
    }

    fn expected_extension() -> &'static str {
        if cfg!(target_os = "windows") {
            "dll"
        } else if cfg!(target_os = "macos") {
            "dylib"
        } else {
            "so"
        }
    }
}

impl BundleOpener for NativeBundleOpener {
    fn open(&self, bundle: &Path) -> Result<OpenedBundle, LoadError> {
        if bundle.extension() != Some(OsStr::new(Self::expected_extension())) {
            return Err(LoadError::UnsupportedBundle(bundle.to_path_buf()));
        }

        let library = unsafe { Library::new(bundle) }.map_err(|source| LoadError::Library {
            path: bundle.to_path_buf(),
            source,
        })?;

        let register: NativeRegisterViews = unsafe {
            let symbol: Symbol<NativeRegisterViews> = library
                .get(REGISTER_VIEWS_SYMBOL.as_bytes())
                .map_err(|_| LoadError::MissingEntryPoint {
                    path: bundle.to_path_buf(),
                    symbol: REGISTER_VIEWS_SYMBOL,
                })?;
            *symbol
        };

        // Declared after `library` so partial registrations drop while it is mapped
        let mut classes = ClassRegistry::new();
        if !register(&mut classes) {
            return Err(LoadError::Panicked(format!("registration of {}", bundle.display())));
        }
        debug!("Opened native bundle {}: {} classes", bundle.display(), classes.len());

        Ok(OpenedBundle {
            classes,
            _library: Some(library),
        })
    }
}

/// Opens bundles linked into the host process, keyed by bundle path
#[derive(Default)]
pub struct StaticBundleOpener {
    bundles: HashMap<PathBuf, RegisterViews>,
}

impl StaticBundleOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(mut self, path: impl Into<PathBuf>, register: RegisterViews) -> Self {
        self.bundles.insert(path.into(), register);
        self
    }
}

impl BundleOpener for StaticBundleOpener {
    fn open(&self, bundle: &Path) -> Result<OpenedBundle, LoadError> {
        let register = self
            .bundles
            .get(bundle)
            .ok_or_else(|| LoadError::BundleNotFound(bundle.to_path_buf()))?;

        let classes = run_registration(bundle, *register)?;
        Ok(OpenedBundle::from_registry(classes))
    }
}

/// Run a bundle's registration into an empty class table
fn run_registration(bundle: &Path, register: RegisterViews) -> Result<ClassRegistry, LoadError> {
    let mut classes = ClassRegistry::new();
    panic::catch_unwind(AssertUnwindSafe(|| register(&mut classes)))
        .map_err(|_| LoadError::Panicked(format!("registration of {}", bundle.display())))?;
    Ok(classes)
}
