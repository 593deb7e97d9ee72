mod loader;

pub use loader::{Config, LoaderConfig, ReportConfig};
