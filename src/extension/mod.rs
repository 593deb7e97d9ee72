//! Extension descriptions produced by a discovery scan.
//!
//! An [`ExtensionInfo`] is built from one installed package's metadata
//! manifest. Each `<screen>` the manifest declares becomes a [`Screen`] that
//! can later be handed to the loader.

use serde::{Deserialize, Serialize};

/// Permission a package must request to be considered an extension.
pub const EXTENSION_PERMISSION: &str = "com.i906.mpt.permission.MPT_EXTENSION";

/// Meta-data key under which an extension registers its manifest resource.
pub const EXTENSION_METADATA: &str = "com.i906.mpt.extension.ExtensionInfo";

/// Root tag of an extension manifest.
pub const ROOT_TAG: &str = "mpt-extension";

/// Repeatable child tag declaring one loadable screen.
pub const SCREEN_TAG: &str = "screen";

/// One extension package and the screens it declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Display name from the manifest root tag
    pub name: Option<String>,

    /// Author from the manifest root tag
    pub author: Option<String>,

    /// Screens in document order
    pub screens: Vec<Screen>,
}

impl ExtensionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A loadable UI contribution declared by an extension manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Screen {
    /// Package that owns this screen.
    ///
    /// Always the package being scanned when the screen was parsed, never a
    /// value taken from the manifest itself.
    pub apk: String,

    /// Display label
    pub name: Option<String>,

    /// Fully-qualified name of the view class to instantiate
    pub view: Option<String>,
}

impl Screen {
    pub fn new(apk: impl Into<String>, name: Option<String>, view: Option<String>) -> Self {
        Self {
            apk: apk.into(),
            name,
            view,
        }
    }
}
