use crate::extension::{ExtensionInfo, Screen};
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
pub struct TerminalReporter;

impl TerminalReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, extensions: &[ExtensionInfo]) -> Result<()> {
        if extensions.is_empty() {
            println!("{}", "No extensions installed.".yellow().bold());
            return Ok(());
        }

        // Print header
        println!();
        println!(
            "{}",
            format!("Found {} extensions:", extensions.len())
                .green()
                .bold()
        );
        println!();

        for extension in extensions {
            self.print_extension(extension);
        }

        self.print_summary(extensions);

        Ok(())
    }

    fn print_extension(&self, extension: &ExtensionInfo) {
        let name = extension.name.as_deref().unwrap_or("<unnamed>");
        match &extension.author {
            Some(author) => println!("{} {} {}", name.cyan().bold(), "by".dimmed(), author),
            None => println!("{}", name.cyan().bold()),
        }

        if extension.screens.is_empty() {
            println!("  {}", "no screens".dimmed());
        }

        for screen in &extension.screens {
            println!("  {} {}", "●".green(), screen_line(screen));
        }

        println!();
    }

    fn print_summary(&self, extensions: &[ExtensionInfo]) {
        let screens: usize = extensions.iter().map(|e| e.screens.len()).sum();

        println!("{}", "─".repeat(60).dimmed());
        println!(
            "Summary: {} extensions, {} screens",
            extensions.len(),
            screens
        );
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// One screen as `label → view [package]`
fn screen_line(screen: &Screen) -> String {
    format!(
        "{} {} {} {}",
        screen.name.as_deref().unwrap_or("<unnamed>"),
        "→".dimmed(),
        screen.view.as_deref().unwrap_or("<no view>").white(),
        format!("[{}]", screen.apk).dimmed()
    )
}
