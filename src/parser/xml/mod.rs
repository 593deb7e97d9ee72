//! Streaming parsers for XML metadata resources.

mod extension_info;

pub use extension_info::{ExtensionInfoParser, ManifestError};
