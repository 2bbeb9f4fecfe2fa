//! Command-line frontend for the Physrelay worker.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Physrelay: a physics worker bridged through a shared body buffer",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the body buffer layout for a given capacity
    Layout {
        /// Number of body records
        #[arg(short, long, default_value = "10000")]
        capacity: usize,
    },

    /// Drop a handful of bodies onto a ground plane and report where they land
    Drop {
        /// Number of falling bodies
        #[arg(short, long, default_value = "8")]
        bodies: usize,

        /// Seconds of wall time to run
        #[arg(short, long, default_value = "2.0")]
        seconds: f64,

        /// RNG seed for the scene
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Pass the buffer back and forth instead of sharing it
        #[arg(long)]
        transfer: bool,

        /// Worker config as a JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run many bodies and report frame and step timings
    Stress {
        /// Number of bodies
        #[arg(short, long, default_value = "500")]
        bodies: usize,

        /// Seconds of wall time to run
        #[arg(short, long, default_value = "3.0")]
        seconds: f64,

        /// RNG seed for the scene
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Pass the buffer back and forth instead of sharing it
        #[arg(long)]
        transfer: bool,

        /// Worker config as a JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relay=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Layout { capacity } => commands::layout::run(capacity),
        Commands::Drop {
            bodies,
            seconds,
            seed,
            transfer,
            config,
        } => commands::drop::run(bodies, seconds, seed, transfer, config.as_deref()),
        Commands::Stress {
            bodies,
            seconds,
            seed,
            transfer,
            config,
        } => commands::stress::run(bodies, seconds, seed, transfer, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
