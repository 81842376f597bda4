//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers the configuration, builds the tokio
//! runtime, dispatches to the command handlers, and prints every error.

use clap::Parser;

use sidecar_config::{CliArgs, Config};
use sidecar_utils::error::SidecarError;
use sidecar_utils::exit_codes::ExitCode;
use sidecar_utils::logging::init_tracing;
use sidecar_utils::types::RunMode;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Handles ALL output including errors and returns the exit code on failure;
/// `main` only maps it to the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialise logging: {e}");
    }

    let cli_args = cli_args_for(&cli);
    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report(&SidecarError::Config(err))),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                no_wait_ready,
                json,
                ..
            } => commands::execute_run(config, !no_wait_ready, json).await,
            Commands::Keygen { .. } => commands::execute_keygen(&config),
            Commands::Port { start, attempts } => {
                commands::execute_port(&config, start, attempts).await
            }
            Commands::Config { json } => commands::execute_config(&config, json),
        }
    });

    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<SidecarError>() {
            Some(sidecar_err) => Err(report(sidecar_err)),
            None => {
                eprintln!("Error: {err:#}");
                Err(ExitCode::INTERNAL)
            }
        },
    }
}

fn report(err: &SidecarError) -> ExitCode {
    eprint!("{}", err.display_for_user());
    err.to_exit_code()
}

/// Configuration overrides carried by the subcommand flags.
fn cli_args_for(cli: &Cli) -> CliArgs {
    let mut args = CliArgs {
        config_path: cli.config.clone(),
        ..CliArgs::default()
    };

    match &cli.command {
        Commands::Run {
            entry_point,
            port,
            fixed_port,
            production,
            debug,
            shutdown_timeout,
            ..
        } => {
            args.entry_point = entry_point.clone();
            args.port = *port;
            args.fixed_port = *fixed_port;
            args.run_mode = if *production {
                Some(RunMode::Production)
            } else if *debug {
                Some(RunMode::Debug)
            } else {
                None
            };
            args.shutdown_timeout_secs = *shutdown_timeout;
        }
        Commands::Keygen { length } => args.key_length = *length,
        Commands::Port { .. } | Commands::Config { .. } => {}
    }

    args
}
