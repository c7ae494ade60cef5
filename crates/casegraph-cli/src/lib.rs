//! Casegraph CLI library.
//!
//! Configuration, argument parsing, output formatting and command execution
//! for the `casegraph` binary. Commands run the coordinator and janitor
//! services directly against the local data directory.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use context::Context;
pub use error::{CliError, Result};
pub use output::Formatter;
