//! CLI argument definitions (clap derive)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sidecar - local service supervisor
#[derive(Parser, Debug)]
#[command(name = "sidecar")]
#[command(about = "Launch a local HTTP service as a child process and shut it down cleanly")]
#[command(long_about = r#"
sidecar launches a local HTTP service (by default `python -m flask run`) with a
per-launch admin key, waits until it answers, and on exit asks it to shut down
over HTTP before force-killing it.

EXAMPLES:
  # Run the service defined in .sidecar/config.toml until Ctrl-C
  sidecar run

  # Run a specific entry point on a fixed port in production mode
  sidecar run --entry-point ./api --port 5050 --fixed-port --production

  # Print a fresh admin key / a free loopback port
  sidecar keygen --length 16
  sidecar port --start 5000

  # Show the effective configuration and where each value came from
  sidecar config --json

CONFIGURATION:
  Precedence: CLI flags > config file > defaults
  The config file is --config, else $SIDECAR_HOME/config.toml, else the nearest
  .sidecar/config.toml searching upward from the current directory.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging, including child output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the service, print its base URL, and stop it on Ctrl-C
    Run {
        /// Launch module of the service
        #[arg(long)]
        entry_point: Option<PathBuf>,

        /// Preferred port
        #[arg(long)]
        port: Option<u16>,

        /// Use --port as-is instead of probing for a free port
        #[arg(long)]
        fixed_port: bool,

        /// Run in production mode (debugger and reloader off)
        #[arg(long)]
        production: bool,

        /// Enable the service's interactive debugger
        #[arg(long, conflicts_with = "production")]
        debug: bool,

        /// Seconds to wait for a voluntary exit before force-killing
        #[arg(long)]
        shutdown_timeout: Option<u64>,

        /// Print the base URL without waiting for readiness
        #[arg(long)]
        no_wait_ready: bool,

        /// Emit machine-readable JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print a fresh admin key
    Keygen {
        /// Number of characters
        #[arg(long)]
        length: Option<usize>,
    },

    /// Print a free loopback port
    Port {
        /// First port to try
        #[arg(long)]
        start: Option<u16>,

        /// Number of consecutive ports to try
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Print the effective configuration with value sources
    Config {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
