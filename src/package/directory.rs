use super::{resolve_within, ApplicationInfo, PackageError, PackageInfo, PackageManager};
use ignore::WalkBuilder;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

/// File that marks a directory as an installed package
pub const PACKAGE_DESCRIPTOR: &str = "package.toml";

/// On-disk package descriptor.
///
/// ```toml
/// package = "com.example.qibla"
/// code = "libqibla.so"
/// uses-permissions = ["com.i906.mpt.permission.MPT_EXTENSION"]
///
/// [meta-data]
/// "com.i906.mpt.extension.ExtensionInfo" = "res/xml/extension.xml"
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PackageDescriptor {
    package: String,
    code: PathBuf,
    #[serde(default)]
    uses_permissions: Vec<String>,
    #[serde(default)]
    meta_data: BTreeMap<String, PathBuf>,
}

/// Package manager backed by install directories.
///
/// Every immediate subdirectory of an install root that contains a
/// `package.toml` is one installed package. Roots are listed in order and
/// the packages inside a root are sorted by directory name.
#[derive(Debug, Clone)]
pub struct DirectoryPackageManager {
    roots: Vec<PathBuf>,
}

impl DirectoryPackageManager {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find package directories in one install root
    fn scan_root(&self, root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            trace!("Install root does not exist: {}", root.display());
            return Vec::new();
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(false) // Install roots are not source trees
            .hidden(true)            // Skip hidden entries
            .follow_links(false)
            .max_depth(Some(2))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.depth() == 2)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| entry.file_name() == PACKAGE_DESCRIPTOR)
            .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
            .collect()
    }
}

impl PackageManager for DirectoryPackageManager {
    fn installed_packages(&self) -> Result<Vec<PackageInfo>, PackageError> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();

        for root in &self.roots {
            for dir in self.scan_root(root) {
                let info = match read_package(&dir) {
                    Ok(info) => info,
                    Err(e) => {
                        warn!("Skipping package in {}: {}", dir.display(), e);
                        continue;
                    }
                };

                if !seen.insert(info.package_name.clone()) {
                    debug!(
                        "Package {} in {} is shadowed by an earlier install root",
                        info.package_name,
                        dir.display()
                    );
                    continue;
                }

                trace!("Found package {}: {}", info.package_name, dir.display());
                packages.push(info);
            }
        }

        debug!("Found {} installed packages", packages.len());
        Ok(packages)
    }

    fn package_info(&self, package_name: &str) -> Result<PackageInfo, PackageError> {
        self.installed_packages()?
            .into_iter()
            .find(|p| p.package_name == package_name)
            .ok_or_else(|| PackageError::NotFound(package_name.to_string()))
    }

    fn load_xml_metadata(
        &self,
        app: &ApplicationInfo,
        key: &str,
    ) -> Result<Option<Box<dyn BufRead + Send>>, PackageError> {
        let Some(path) = app.meta_data.get(key) else {
            return Ok(None);
        };

        match File::open(path) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "Meta-data resource {} of {} is missing: {}",
                    key,
                    app.package_name,
                    path.display()
                );
                Ok(None)
            }
            Err(source) => Err(PackageError::Io {
                path: path.clone(),
                source,
            }),
        }
    }
}

/// Read and validate the descriptor of one package directory
fn read_package(dir: &Path) -> Result<PackageInfo, PackageError> {
    let path = dir.join(PACKAGE_DESCRIPTOR);
    let contents = std::fs::read_to_string(&path).map_err(|source| PackageError::Io {
        path: path.clone(),
        source,
    })?;
    let descriptor: PackageDescriptor =
        toml::from_str(&contents).map_err(|source| PackageError::Descriptor {
            path: path.clone(),
            source,
        })?;

    if !is_valid_package_name(&descriptor.package) {
        return Err(PackageError::InvalidName(descriptor.package));
    }

    let source_dir = resolve_within(dir, &descriptor.code)
        .ok_or_else(|| PackageError::InvalidResourcePath(descriptor.code.clone()))?;

    let mut meta_data = BTreeMap::new();
    for (key, resource) in descriptor.meta_data {
        let resolved = resolve_within(dir, &resource)
            .ok_or_else(|| PackageError::InvalidResourcePath(resource.clone()))?;
        meta_data.insert(key, resolved);
    }

    Ok(PackageInfo {
        package_name: descriptor.package.clone(),
        requested_permissions: descriptor.uses_permissions,
        application: ApplicationInfo {
            package_name: descriptor.package,
            source_dir,
            data_dir: dir.to_path_buf(),
            meta_data,
        },
    })
}

/// Java-style package names: at least two dot-separated identifiers
fn is_valid_package_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$")
                .expect("package name pattern is valid")
        })
        .is_match(name)
}
