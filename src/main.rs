use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{miette, IntoDiagnostic, Result};
use mpt_extensions::{Config, ExtensionManager, ReportFormat, Reporter, Screen};
use std::path::PathBuf;
use tracing::info;

/// mpt-extensions - Discover and load installed MPT extensions
#[derive(Parser, Debug)]
#[command(name = "mpt-extensions")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Install roots to scan (can be specified multiple times)
    #[arg(short, long = "packages", value_name = "DIR", global = true)]
    packages: Vec<PathBuf>,

    /// Do not re-check the extension permission when loading a screen
    #[arg(long, global = true)]
    no_recheck: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed extensions and their screens
    Scan {
        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (for json format)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load the view of one screen
    Load {
        /// Package that owns the screen
        package: String,

        /// Fully-qualified view class
        view: String,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    info!("mpt-extensions v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&cli)?;
    if config.package_dirs.is_empty() {
        return Err(miette!(
            "No install roots configured; pass --packages or set package_dirs"
        ));
    }

    let manager = ExtensionManager::from_config(&config);

    match cli.command {
        Command::Scan { format, output } => {
            let format = match format {
                Some(format) => format.into(),
                None => ReportFormat::from_name(&config.report.format).ok_or_else(|| {
                    miette!("Unknown report format: {}", config.report.format)
                })?,
            };
            run_scan(&manager, format, output)
        }
        Command::Load { package, view } => run_load(&manager, package, view),
    }
}

fn run_scan(manager: &ExtensionManager, format: ReportFormat, output: Option<PathBuf>) -> Result<()> {
    info!("Scanning installed packages...");
    let extensions = manager.scan();
    info!("Found {} extensions", extensions.len());

    let reporter = Reporter::new(format, output);
    reporter.report(&extensions)
}

fn run_load(manager: &ExtensionManager, package: String, view: String) -> Result<()> {
    let screen = Screen::new(package, None, Some(view));

    let Some(loaded) = manager.load_view(&screen) else {
        return Err(miette!(
            "Screen {} of {} is unavailable",
            screen.view.as_deref().unwrap_or_default(),
            screen.apk
        ));
    };

    let context = loaded.context();
    println!(
        "{} {}",
        "Loaded".green().bold(),
        loaded.class_name().white().bold()
    );
    println!("  {} {}", "bundle:".dimmed(), loaded.bundle().display());
    println!("  {} {}", "package:".dimmed(), context.package_name());
    println!("  {} {}", "restricted:".dimmed(), context.is_restricted());
    println!(
        "  {} {}",
        "permissions:".dimmed(),
        context.permissions().collect::<Vec<_>>().join(", ")
    );

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations
        let cwd = std::env::current_dir().into_diagnostic()?;
        Config::from_default_locations(&cwd)?
    };

    // Override with CLI arguments
    if !cli.packages.is_empty() {
        config.package_dirs = cli.packages.clone();
    }
    if cli.no_recheck {
        config.loader.recheck_permission = false;
    }

    Ok(config)
}
