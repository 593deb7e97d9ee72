//! Host-facing entry point for extension discovery and loading.

use crate::config::Config;
use crate::discovery::ExtensionScanner;
use crate::extension::{ExtensionInfo, Screen};
use crate::loader::{
    BundleOpener, ClassRegistry, ContextFactory, LoadedView, PackageContextFactory,
    SandboxedLoader,
};
use crate::package::{DirectoryPackageManager, PackageManager};
use std::sync::Arc;

/// Scans for extensions and loads their screens.
///
/// Meant to be built once at host startup and shared. It holds no
/// extension state: callers that want to reuse a scan or a view keep the
/// returned values themselves.
pub struct ExtensionManager {
    scanner: ExtensionScanner,
    loader: SandboxedLoader,
}

impl ExtensionManager {
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self {
            scanner: ExtensionScanner::new(packages.clone()),
            loader: SandboxedLoader::new(packages),
        }
    }

    /// Manager over the install roots and loader policy in `config`
    pub fn from_config(config: &Config) -> Self {
        let packages: Arc<dyn PackageManager> =
            Arc::new(DirectoryPackageManager::new(config.package_dirs.clone()));
        let contexts = PackageContextFactory::new(packages.clone())
            .with_denied(config.loader.denied_packages.iter().cloned());

        Self::new(packages)
            .with_context_factory(Arc::new(contexts))
            .with_permission_recheck(config.loader.recheck_permission)
    }

    pub fn with_host_classes(mut self, classes: ClassRegistry) -> Self {
        self.loader = self.loader.with_host_classes(classes);
        self
    }

    pub fn with_bundle_opener(mut self, opener: Arc<dyn BundleOpener>) -> Self {
        self.loader = self.loader.with_bundle_opener(opener);
        self
    }

    pub fn with_context_factory(mut self, contexts: Arc<dyn ContextFactory>) -> Self {
        self.loader = self.loader.with_context_factory(contexts);
        self
    }

    pub fn with_permission_recheck(mut self, enabled: bool) -> Self {
        self.loader = self.loader.with_permission_recheck(enabled);
        self
    }

    /// Describe every installed extension
    pub fn scan(&self) -> Vec<ExtensionInfo> {
        self.scanner.scan()
    }

    /// Load the view of one screen, or `None` if it is unavailable
    pub fn load_view(&self, screen: &Screen) -> Option<LoadedView> {
        self.loader.load_view(screen)
    }
}
