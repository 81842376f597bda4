//! Command-line interface for sidecar
//!
//! - `args`: clap argument definitions
//! - `run`: entry point, configuration discovery and dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
