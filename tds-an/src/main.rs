//! tds-an (TDS Analyzer) - Command-line analysis of temporal dominance data
//!
//! Loads trial records from a file or directory tree, builds one curve per
//! trial and runs the requested analysis.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tds_an::commands::{self, MergeOptions};
use tds_common::config::{ConfigResolver, LoggingConfig};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for tds-an
#[derive(Parser, Debug)]
#[command(name = "tds-an")]
#[command(about = "Temporal dominance curve analyzer")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TDS_CONFIG")]
    config: Option<PathBuf>,

    /// Time steps per curve
    #[arg(short, long, global = true, env = "TDS_RESOLUTION")]
    resolution: Option<usize>,

    /// Record file extension used when PATH is a directory
    #[arg(short, long, global = true)]
    extension: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every curve with its trial statistics
    Summary {
        path: PathBuf,
    },

    /// Merge curves (optionally per metadata group) and report durations
    Merge {
        path: PathBuf,

        /// Merge each group sharing this metadata value separately
        #[arg(short, long, value_name = "KEY")]
        group_by: Option<String>,

        /// Name of the merged curve (prefix when grouping)
        #[arg(short, long)]
        name: Option<String>,

        /// Moving-average width as a fraction of the resolution
        #[arg(short, long, value_name = "LEVEL")]
        smooth: Option<f64>,

        /// Write one table per merged curve into this directory
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Leave the delay row out of reports and tables
        #[arg(long)]
        no_delay: bool,
    },

    /// Distance of every curve from the overall average
    Distance {
        path: PathBuf,
    },

    /// Bootstrap the merged dominance durations
    Bootstrap {
        path: PathBuf,

        #[arg(short, long, default_value = "1000")]
        iterations: usize,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Per-curve feature table for principal component analysis
    Features {
        path: PathBuf,

        /// Z-score every feature column
        #[arg(long)]
        standardize: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let level: Level = logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Resolved before logging exists; the source is logged after init
    let (mut config, source) = ConfigResolver::new()
        .with_config_path(args.config.clone())
        .with_resolution(args.resolution)
        .resolve_with_source()
        .context("Failed to resolve configuration")?;
    if let Some(extension) = args.extension {
        config.file_extension = extension;
    }

    init_tracing(&config.logging)?;

    // Build identification first, before any loading
    info!(
        "Starting TDS Analyzer (tds-an) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    source.log();
    info!(
        "Resolution {} steps, record extension .{}",
        config.resolution,
        config.file_extension.trim_start_matches('.')
    );

    let report = match args.command {
        Command::Summary { path } => commands::summary(&commands::load(&path, &config)?)?,
        Command::Merge {
            path,
            group_by,
            name,
            smooth,
            out,
            no_delay,
        } => {
            let curves = commands::load(&path, &config)?;
            let options = MergeOptions {
                group_by,
                name,
                smooth,
                out,
                include_delay: !no_delay,
            };
            commands::merge(&curves, &options, &config)?
        }
        Command::Distance { path } => commands::distance(&commands::load(&path, &config)?)?,
        Command::Bootstrap {
            path,
            iterations,
            seed,
        } => {
            let curves = commands::load(&path, &config)?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            commands::bootstrap(&curves, iterations, &mut rng)?
        }
        Command::Features { path, standardize } => {
            commands::features(&commands::load(&path, &config)?, standardize, &config)?
        }
    };

    print!("{}", report);
    Ok(())
}
