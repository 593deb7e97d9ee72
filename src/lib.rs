//! mpt-extensions - discovery and sandboxed loading of host extensions
//!
//! Installed packages extend the host by requesting the extension
//! permission and registering an XML manifest under the extension
//! meta-data key.
//!
//! # Architecture
//!
//! 1. **Package queries** - Read-only view of installed packages
//! 2. **Discovery** - Filter packages by permission and collect manifests
//! 3. **Parsing** - Stream each manifest into an `ExtensionInfo`
//! 4. **Loading** - Instantiate a screen's view from the owning package's
//!    code bundle in an isolated namespace with a restricted context
//!
//! Every step fails soft: a broken package is left out of a scan and a
//! broken screen loads as `None`.

pub mod config;
pub mod discovery;
pub mod extension;
pub mod loader;
pub mod manager;
pub mod package;
pub mod parser;
pub mod report;

pub use config::Config;
pub use discovery::ExtensionScanner;
pub use extension::{ExtensionInfo, Screen, EXTENSION_METADATA, EXTENSION_PERMISSION};
pub use loader::{
    BundleOpener, ClassRegistry, Context, LoadError, LoadedView, PrayerView, SandboxedLoader,
};
pub use manager::ExtensionManager;
pub use package::{DirectoryPackageManager, PackageError, PackageInfo, PackageManager};
pub use parser::ExtensionInfoParser;
pub use report::{ReportFormat, Reporter};
