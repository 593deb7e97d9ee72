//! Sandboxed loading of extension views.
//!
//! Loading a [`Screen`] opens the owning package's code bundle in a fresh,
//! isolated class namespace chained to the host's own classes, resolves the
//! screen's view class there and constructs it with a restricted context
//! scoped to the owning package. Any failure along the way makes the screen
//! unavailable; nothing is cached between loads.

mod bundle;
mod class;
mod context;
mod view;

pub use bundle::{
    BundleOpener, NativeBundleOpener, NativeRegisterViews, OpenedBundle, RegisterViews,
    StaticBundleOpener, REGISTER_VIEWS_SYMBOL,
};
pub use class::{
    BundleClassLoader, ClassLoader, ClassRegistry, Constructor, ContextConstructor,
    DefaultConstructor, HostClassLoader, ViewClass,
};
pub use context::{Context, ContextError, ContextFactory, PackageContextFactory};
pub use view::PrayerView;

use crate::extension::{Screen, EXTENSION_PERMISSION};
use crate::package::{PackageError, PackageManager};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a screen could not be loaded
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("Package {0} no longer requests the extension permission")]
    PermissionRevoked(String),
    #[error("Screen of {0} does not name a view class")]
    MissingViewClass(String),
    #[error("Unsupported bundle type: {}", .0.display())]
    UnsupportedBundle(PathBuf),
    #[error("No bundle registered at {}", .0.display())]
    BundleNotFound(PathBuf),
    #[error("Failed to open bundle {}: {source}", path.display())]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("Bundle {} does not export {symbol}", path.display())]
    MissingEntryPoint { path: PathBuf, symbol: &'static str },
    #[error("Class not found: {0}")]
    ClassNotFound(String),
    #[error("Class {0} has no constructor taking a Context")]
    NoSuchConstructor(String),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("Constructing {class} failed: {reason}")]
    Construction { class: String, reason: String },
    #[error("Extension code panicked during {0}")]
    Panicked(String),
}

/// A constructed extension view.
///
/// Keeps the namespace it was loaded from alive, so code from a native
/// bundle stays mapped until the view is dropped.
pub struct LoadedView {
    // Dropped before the namespace that owns its code
    view: Box<dyn PrayerView>,
    namespace: Arc<BundleClassLoader>,
}

impl LoadedView {
    /// Code bundle the view was loaded from
    pub fn bundle(&self) -> &Path {
        self.namespace.path()
    }
}

impl Deref for LoadedView {
    type Target = dyn PrayerView;

    fn deref(&self) -> &Self::Target {
        self.view.as_ref()
    }
}

impl DerefMut for LoadedView {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.view.as_mut()
    }
}

impl fmt::Debug for LoadedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedView")
            .field("class", &self.view.class_name())
            .field("package", &self.view.context().package_name())
            .field("bundle", &self.namespace.path())
            .finish()
    }
}

/// Loads screens into views
pub struct SandboxedLoader {
    packages: Arc<dyn PackageManager>,
    host: Arc<HostClassLoader>,
    opener: Arc<dyn BundleOpener>,
    contexts: Arc<dyn ContextFactory>,
    recheck_permission: bool,
}

impl SandboxedLoader {
    /// Loader with no host classes, native bundles and restricted package contexts
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self {
            contexts: Arc::new(PackageContextFactory::new(packages.clone())),
            packages,
            host: Arc::new(HostClassLoader::default()),
            opener: Arc::new(NativeBundleOpener::new()),
            recheck_permission: true,
        }
    }

    /// Classes the host exports to every bundle namespace
    pub fn with_host_classes(mut self, classes: ClassRegistry) -> Self {
        self.host = Arc::new(HostClassLoader::new(classes));
        self
    }

    pub fn with_bundle_opener(mut self, opener: Arc<dyn BundleOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_context_factory(mut self, contexts: Arc<dyn ContextFactory>) -> Self {
        self.contexts = contexts;
        self
    }

    /// Require the owning package to still request the extension permission at load time
    pub fn with_permission_recheck(mut self, enabled: bool) -> Self {
        self.recheck_permission = enabled;
        self
    }

    /// Load the view declared by `screen`, or `None` if it is unavailable
    pub fn load_view(&self, screen: &Screen) -> Option<LoadedView> {
        match self.try_load_view(screen) {
            Ok(view) => {
                debug!(
                    "Loaded {} from {}",
                    view.class_name(),
                    view.bundle().display()
                );
                Some(view)
            }
            Err(e) => {
                warn!(
                    "Screen {} of {} is unavailable: {}",
                    screen.name.as_deref().unwrap_or("<unnamed>"),
                    screen.apk,
                    e
                );
                None
            }
        }
    }

    fn try_load_view(&self, screen: &Screen) -> Result<LoadedView, LoadError> {
        let package = self.packages.package_info(&screen.apk)?;

        if self.recheck_permission && !package.requests_permission(EXTENSION_PERMISSION) {
            return Err(LoadError::PermissionRevoked(screen.apk.clone()));
        }

        let class_name = screen
            .view
            .as_deref()
            .ok_or_else(|| LoadError::MissingViewClass(screen.apk.clone()))?;

        let source_dir = package.application.source_dir;
        let bundle = self.opener.open(&source_dir)?;
        let namespace = Arc::new(BundleClassLoader::new(
            source_dir,
            bundle,
            self.host.clone(),
        ));

        let class = namespace.load_class(class_name)?;
        let constructor = class
            .context_constructor()
            .ok_or_else(|| LoadError::NoSuchConstructor(class_name.to_string()))?;

        let context = self.contexts.create_package_context(&screen.apk)?;

        let view = match panic::catch_unwind(AssertUnwindSafe(|| constructor(context))) {
            Ok(Ok(view)) => view,
            Ok(Err(err)) => {
                // The error's code lives in the bundle, so render and drop it
                // before the namespace can unload the bundle
                let reason = format!("{err:#}");
                drop(err);
                return Err(LoadError::Construction {
                    class: class_name.to_string(),
                    reason,
                });
            }
            Err(_) => return Err(LoadError::Panicked(format!("construction of {class_name}"))),
        };

        Ok(LoadedView { view, namespace })
    }
}
