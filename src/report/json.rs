use crate::extension::ExtensionInfo;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, extensions: &[ExtensionInfo]) -> Result<()> {
        let report = JsonReport::from_extensions(extensions);
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    total_extensions: usize,
    total_screens: usize,
    extensions: &'a [ExtensionInfo],
}

impl<'a> JsonReport<'a> {
    fn from_extensions(extensions: &'a [ExtensionInfo]) -> Self {
        Self {
            version: "1.0",
            total_extensions: extensions.len(),
            total_screens: extensions.iter().map(|e| e.screens.len()).sum(),
            extensions,
        }
    }
}
