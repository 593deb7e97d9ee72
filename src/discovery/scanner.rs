use crate::extension::{ExtensionInfo, EXTENSION_METADATA, EXTENSION_PERMISSION};
use crate::package::{PackageInfo, PackageManager};
use crate::parser::ExtensionInfoParser;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Finds installed packages that extend the host.
///
/// Every call to [`scan`](Self::scan) queries the package manager afresh;
/// nothing is remembered between scans.
pub struct ExtensionScanner {
    packages: Arc<dyn PackageManager>,
    parser: ExtensionInfoParser,
}

impl ExtensionScanner {
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self {
            packages,
            parser: ExtensionInfoParser::new(),
        }
    }

    /// Describe every installed extension, in package manager order.
    ///
    /// Packages that do not request the extension permission, register no
    /// manifest, or ship a manifest that fails to parse are left out.
    pub fn scan(&self) -> Vec<ExtensionInfo> {
        let packages = match self.packages.installed_packages() {
            Ok(packages) => packages,
            Err(e) => {
                warn!("Failed to query installed packages: {}", e);
                return Vec::new();
            }
        };

        let extensions: Vec<ExtensionInfo> = packages
            .iter()
            .filter(|package| package.requests_permission(EXTENSION_PERMISSION))
            .filter_map(|package| self.describe(package))
            .collect();

        debug!(
            "Found {} extensions among {} installed packages",
            extensions.len(),
            packages.len()
        );
        extensions
    }

    /// Read one extension package's manifest
    fn describe(&self, package: &PackageInfo) -> Option<ExtensionInfo> {
        let stream = match self
            .packages
            .load_xml_metadata(&package.application, EXTENSION_METADATA)
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    "Failed to open extension manifest of {}: {}",
                    package.package_name, e
                );
                return None;
            }
        };

        if stream.is_none() {
            trace!("{} registers no extension manifest", package.package_name);
        }

        self.parser.parse(&package.package_name, stream)
    }
}
