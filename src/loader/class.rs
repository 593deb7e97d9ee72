use super::{Context, LoadError, OpenedBundle, PrayerView};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

/// Constructor taking the restricted context of the owning package
pub type ContextConstructor =
    Arc<dyn Fn(Context) -> anyhow::Result<Box<dyn PrayerView>> + Send + Sync>;

/// Constructor taking no arguments
pub type DefaultConstructor = Arc<dyn Fn() -> anyhow::Result<Box<dyn PrayerView>> + Send + Sync>;

/// A constructor exposed by a view class.
///
/// Build these with [`Constructor::with_context`] and [`Constructor::no_args`].
/// Both are generic, so the panic guard they add is compiled into the crate
/// that registers the class. A native bundle carries its own copy of the
/// standard library, and only that copy can catch the bundle's panics.
#[derive(Clone)]
pub enum Constructor {
    Default(DefaultConstructor),
    WithContext(ContextConstructor),
}

impl Constructor {
    pub fn with_context<F>(constructor: F) -> Self
    where
        F: Fn(Context) -> anyhow::Result<Box<dyn PrayerView>> + Send + Sync + 'static,
    {
        Self::WithContext(Arc::new(move |context| {
            panic::catch_unwind(AssertUnwindSafe(|| constructor(context)))
                .unwrap_or_else(|_| Err(anyhow::anyhow!("constructor panicked")))
        }))
    }

    pub fn no_args<F>(constructor: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn PrayerView>> + Send + Sync + 'static,
    {
        Self::Default(Arc::new(move || {
            panic::catch_unwind(AssertUnwindSafe(|| constructor()))
                .unwrap_or_else(|_| Err(anyhow::anyhow!("constructor panicked")))
        }))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default(_) => f.write_str("Constructor::Default"),
            Self::WithContext(_) => f.write_str("Constructor::WithContext"),
        }
    }
}

/// A named view class and the constructors it exposes
#[derive(Debug, Clone)]
pub struct ViewClass {
    name: String,
    constructors: Vec<Constructor>,
}

impl ViewClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The constructor taking exactly one `Context`, if the class has one
    pub fn context_constructor(&self) -> Option<ContextConstructor> {
        self.constructors.iter().find_map(|c| match c {
            Constructor::WithContext(f) => Some(f.clone()),
            Constructor::Default(_) => None,
        })
    }
}

/// Table of view classes keyed by fully-qualified name.
///
/// Bundles fill one of these when they are opened; the host keeps one for
/// the classes it exports itself.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<ViewClass>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a class. The first definition of a name wins.
    pub fn define(&mut self, class: ViewClass) {
        if self.classes.contains_key(class.name()) {
            warn!("Ignoring duplicate definition of class {}", class.name());
            return;
        }
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// Shorthand for defining a class with a single context constructor
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(Context) -> anyhow::Result<Box<dyn PrayerView>> + Send + Sync + 'static,
    {
        self.define(ViewClass::new(name).with_constructor(Constructor::with_context(constructor)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ViewClass>> {
        self.classes.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A namespace that resolves view classes by name
pub trait ClassLoader: Send + Sync {
    fn load_class(&self, name: &str) -> Result<Arc<ViewClass>, LoadError>;
}

/// Resolves the classes the host itself exports
#[derive(Debug, Clone, Default)]
pub struct HostClassLoader {
    classes: ClassRegistry,
}

impl HostClassLoader {
    pub fn new(classes: ClassRegistry) -> Self {
        Self { classes }
    }
}

impl ClassLoader for HostClassLoader {
    fn load_class(&self, name: &str) -> Result<Arc<ViewClass>, LoadError> {
        self.classes
            .get(name)
            .ok_or_else(|| LoadError::ClassNotFound(name.to_string()))
    }
}

/// Isolated namespace over one opened bundle.
///
/// Lookups are delegated to the parent first, so a bundle can use the host's
/// classes but cannot replace them.
pub struct BundleClassLoader {
    path: PathBuf,
    bundle: OpenedBundle,
    parent: Arc<dyn ClassLoader>,
}

impl BundleClassLoader {
    pub fn new(path: PathBuf, bundle: OpenedBundle, parent: Arc<dyn ClassLoader>) -> Self {
        Self {
            path,
            bundle,
            parent,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClassLoader for BundleClassLoader {
    fn load_class(&self, name: &str) -> Result<Arc<ViewClass>, LoadError> {
        match self.parent.load_class(name) {
            Err(LoadError::ClassNotFound(_)) => {}
            found => return found,
        }

        trace!("Resolving {} in {}", name, self.path.display());
        self.bundle
            .classes()
            .get(name)
            .ok_or_else(|| LoadError::ClassNotFound(name.to_string()))
    }
}
