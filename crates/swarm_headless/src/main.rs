//! Headless wave runner.
//!
//! Runs the population core without graphics: generated waves are loaded,
//! started, and cleared under scripted movement and combat collaborators.
//! One JSON summary per wave goes to stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run five waves with default tuning
//! cargo run -p swarm_headless
//!
//! # Run a specific span of waves, verbosely
//! cargo run -p swarm_headless -- --first-wave 4 --waves 10 --verbose
//!
//! # Use a RON config for the population core
//! cargo run -p swarm_headless -- --config tuning.ron
//! ```

mod runner;

use std::path::PathBuf;
use std::process::ExitCode;
use std::result::Result;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swarm_core::prelude::*;

use crate::runner::{RunnerConfig, WaveRunner};

#[derive(Parser)]
#[command(name = "swarm_headless")]
#[command(about = "Headless wave runner for the Elemental Swarm population core")]
#[command(version)]
struct Cli {
    /// First wave index to run
    #[arg(long, default_value = "1")]
    first_wave: u32,

    /// Number of consecutive waves to run
    #[arg(short, long, default_value = "5")]
    waves: u32,

    /// Abort threshold per wave, in ticks
    #[arg(long, default_value = "20000")]
    max_ticks: u32,

    /// RON file overriding the population core config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let core_config = match load_core_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            tracing::error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let runner_config = RunnerConfig {
        max_ticks_per_wave: cli.max_ticks,
        ..RunnerConfig::default()
    };
    let mut runner = WaveRunner::new(core_config, runner_config);

    for wave in cli.first_wave..cli.first_wave + cli.waves {
        match runner.run_wave(wave) {
            Ok(summary) => match serde_json::to_string(&summary) {
                Ok(line) => println!("{line}"),
                Err(error) => {
                    tracing::error!(wave, %error, "failed to encode wave summary");
                    return ExitCode::FAILURE;
                }
            },
            Err(error) => {
                tracing::error!(wave, %error, "wave run failed");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn load_core_config(path: Option<&std::path::Path>) -> Result<CoreConfig, String> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
    CoreConfig::from_ron(&text).map_err(|e| format!("cannot parse config {}: {e}", path.display()))
}
