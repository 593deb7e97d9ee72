pub mod xml;

pub use xml::{ExtensionInfoParser, ManifestError};
