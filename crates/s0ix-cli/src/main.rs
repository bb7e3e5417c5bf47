//! CLI for s0ix — how long does this machine really spend in S0ix?

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::ConfigOverrides;

#[derive(Parser)]
#[command(name = "s0ix")]
#[command(about = "s0ix — S0ix residency tracking and reporting")]
#[command(version = s0ix_core::VERSION)]
struct Cli {
    /// JSON config file (fields: poll_interval_ms, window_size, failure_threshold,
    /// backoff_ceiling_ms, deep_idle_tolerance_pct)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read counters below this directory instead of / (for containers and tests)
    #[arg(long, global = true)]
    sysfs_root: Option<PathBuf>,

    /// Sampling period in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Samples in the rolling window
    #[arg(long, global = true)]
    window_size: Option<usize>,

    /// Consecutive read failures before degraded mode
    #[arg(long, global = true)]
    failure_threshold: Option<u32>,

    /// Upper bound on the backed-off polling interval, milliseconds
    #[arg(long, global = true)]
    backoff_ceiling_ms: Option<u64>,

    /// Share of a sample (percent) that counts as full deep idle
    #[arg(long, global = true)]
    deep_idle_tolerance_pct: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the residency counters once and print them
    Probe {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Sample continuously and print a summary until Ctrl-C
    Watch {
        /// Seconds between summaries
        #[arg(long, default_value = "5")]
        refresh: f64,
    },

    /// Sample continuously and serve statistics over HTTP
    Server {
        /// Port to listen on
        #[arg(long, default_value = "8043")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Run a recorded JSON-lines counter file through the pipeline
    Replay {
        /// Recording: one {"elapsed_ms", "deep_idle_ns", "total_ns", "transitions"} per line
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        poll_interval_ms: cli.poll_interval_ms,
        window_size: cli.window_size,
        failure_threshold: cli.failure_threshold,
        backoff_ceiling_ms: cli.backoff_ceiling_ms,
        deep_idle_tolerance_pct: cli.deep_idle_tolerance_pct,
    };
    let config = match commands::build_config(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    let root = cli.sysfs_root.as_deref();

    match cli.command {
        Commands::Probe { json } => commands::probe::run(root, json),
        Commands::Watch { refresh } => commands::watch::run(&config, root, refresh),
        Commands::Server { port, host } => commands::server::run(&config, root, &host, port),
        Commands::Replay { file, json } => commands::replay::run(&config, &file, json),
    }
}
