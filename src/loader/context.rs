use crate::package::{resolve_within, PackageError, PackageInfo, PackageManager};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Context creation errors
#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("Context creation denied for {0}")]
    Denied(String),
}

/// Execution context handed to extension view constructors.
///
/// A restricted context only exposes what the owning package declared for
/// itself: its own permissions and files under its own data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    package_name: String,
    permissions: BTreeSet<String>,
    data_dir: PathBuf,
    restricted: bool,
}

impl Context {
    /// Create a restricted context scoped to `package`
    pub fn restricted(package: &PackageInfo) -> Self {
        Self {
            package_name: package.package_name.clone(),
            permissions: package.requested_permissions.iter().cloned().collect(),
            data_dir: package.application.data_dir.clone(),
            restricted: true,
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Check whether the owning package was granted `permission`
    pub fn check_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    /// Resolve a file inside the package's data directory.
    ///
    /// Paths that are absolute or climb out of the data directory resolve
    /// to `None`.
    pub fn resource_path(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        resolve_within(&self.data_dir, relative.as_ref())
    }
}

/// Host primitive that issues contexts for installed packages.
pub trait ContextFactory: Send + Sync {
    fn create_package_context(&self, package_name: &str) -> Result<Context, ContextError>;
}

/// Issues restricted contexts for packages known to the package manager
pub struct PackageContextFactory {
    packages: Arc<dyn PackageManager>,
    denied: HashSet<String>,
}

impl PackageContextFactory {
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self {
            packages,
            denied: HashSet::new(),
        }
    }

    /// Refuse contexts for the given packages
    pub fn with_denied<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied.extend(packages.into_iter().map(Into::into));
        self
    }
}

impl ContextFactory for PackageContextFactory {
    fn create_package_context(&self, package_name: &str) -> Result<Context, ContextError> {
        if self.denied.contains(package_name) {
            return Err(ContextError::Denied(package_name.to_string()));
        }

        let package = self.packages.package_info(package_name)?;
        debug!("Created restricted context for {}", package_name);
        Ok(Context::restricted(&package))
    }
}
