mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calibre", about = "Astronomical frame calibration pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate a single light frame against bias/dark/flat masters
    Calibrate(commands::calibrate::CalibrateArgs),
    /// Solve a local-normalization affine field between a reference and a target
    Normalize(commands::normalize::NormalizeArgs),
    /// Generate vertical/horizontal superbias images from a master bias
    Superbias(commands::superbias::SuperbiasArgs),
    /// Apply a defect map's pixel-repair parameters (CLI surface only)
    DefectMap(commands::defect_map::DefectMapArgs),
    /// Calibrate a batch of targets, optionally driven by a TOML config file
    Batch(commands::batch::BatchArgs),
    /// Print a default batch configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Calibrate(args) => commands::calibrate::run(args),
        Commands::Normalize(args) => commands::normalize::run(args),
        Commands::Superbias(args) => commands::superbias::run(args),
        Commands::DefectMap(args) => commands::defect_map::run(args),
        Commands::Batch(args) => commands::batch::run(args),
        Commands::Config => commands::config::run(),
    }
}
