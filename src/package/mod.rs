//! Installed package queries.
//!
//! The host exposes its installed packages through [`PackageManager`]. Both
//! the discovery scanner and the loader only ever read from it.

mod directory;

pub use directory::{DirectoryPackageManager, PACKAGE_DESCRIPTOR};

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Package query errors
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Package not installed: {0}")]
    NotFound(String),
    #[error("Invalid package name: {0}")]
    InvalidName(String),
    #[error("Resource path escapes package directory: {}", .0.display())]
    InvalidResourcePath(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse package descriptor {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application-level details of an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub package_name: String,

    /// Location of the package's code bundle
    pub source_dir: PathBuf,

    /// Private data directory; resources resolve relative to it
    pub data_dir: PathBuf,

    /// Registered meta-data resources, keyed by meta-data name
    pub meta_data: BTreeMap<String, PathBuf>,
}

/// An installed package as reported by the package manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub package_name: String,

    /// Permissions the package requests, in declaration order
    pub requested_permissions: Vec<String>,

    pub application: ApplicationInfo,
}

impl PackageInfo {
    /// Check whether the package requests `permission` (exact match)
    pub fn requests_permission(&self, permission: &str) -> bool {
        self.requested_permissions.iter().any(|p| p == permission)
    }
}

/// Read-only view of the host's installed packages.
pub trait PackageManager: Send + Sync {
    /// All installed packages, in the order the host reports them
    fn installed_packages(&self) -> Result<Vec<PackageInfo>, PackageError>;

    /// Look up one installed package by name
    fn package_info(&self, package_name: &str) -> Result<PackageInfo, PackageError>;

    /// Open the XML resource registered under the meta-data `key`.
    ///
    /// Returns `Ok(None)` when the package registers nothing under `key`.
    fn load_xml_metadata(
        &self,
        app: &ApplicationInfo,
        key: &str,
    ) -> Result<Option<Box<dyn BufRead + Send>>, PackageError>;
}

/// Join `relative` onto `base`, refusing absolute paths and `..` components
pub fn resolve_within(base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}
