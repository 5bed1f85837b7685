//! ctmt-statstable: write the region and findings tables of the CT/MT analysis pipeline.
//!
//! Exit codes:
//!   0 - All requested tables written
//!   1 - Missing or malformed input, or a table could not be written

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

use ctmt_statstable::{create_findings_table, create_statstable, Config};

/// Regional CT/MT summary tables
///
/// Examples:
///   ctmt-statstable --data-dir data --graph-dir graphs --table-dir tables regions
///   ctmt-statstable -c ctmt.toml all
///   ctmt-statstable init-config > ctmt.toml
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory of the measurement CSV files
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Directory of the covariance graph edge lists
    #[arg(long, value_name = "DIR", global = true)]
    graph_dir: Option<PathBuf>,

    /// Output directory of the region tables
    #[arg(long, value_name = "DIR", global = true)]
    table_dir: Option<PathBuf>,

    /// Directory holding the parcellation name and lobe lists
    #[arg(long, value_name = "DIR", global = true)]
    fsaverage_dir: Option<PathBuf>,

    /// Output directory of the findings table
    #[arg(long, value_name = "DIR", global = true)]
    paper_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Command {
    /// Write the 308, 68 and 34 region tables
    Regions,
    /// Write the findings table of all configured cohorts
    Findings,
    /// Write the region tables and the findings table
    All,
    /// Print the default configuration as TOML
    InitConfig,
}

impl Args {
    fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::WARN
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Replace the configured directories with the ones given on the command line.
    fn apply_overrides(&self, config: &mut Config) {
        let overrides = [
            (&self.data_dir, &mut config.paths.data_dir),
            (&self.graph_dir, &mut config.paths.graph_dir),
            (&self.table_dir, &mut config.paths.table_dir),
            (&self.fsaverage_dir, &mut config.paths.fsaverage_dir),
            (&self.paper_dir, &mut config.paths.paper_dir),
        ];
        for (arg, dir) in overrides {
            if let Some(arg) = arg {
                *dir = arg.clone();
            }
        }
    }
}

fn main() {
    let args = Args::parse();

    if args.command == Command::InitConfig {
        print!("{}", Config::default_toml());
        return;
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from '{}'", path.display()))?,
        None => Config::default(),
    };
    args.apply_overrides(&mut config);
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    if matches!(args.command, Command::Regions | Command::All) {
        let written = create_statstable(&config).context("Failed to write the region tables")?;
        for path in written {
            info!("Wrote {}", path.display());
        }
    }

    if matches!(args.command, Command::Findings | Command::All) {
        if config.cohorts.is_empty() {
            info!("No cohorts configured, skipping the findings table");
        } else {
            let path = create_findings_table(&config).context("Failed to write the findings table")?;
            info!("Wrote {}", path.display());
        }
    }

    Ok(())
}
