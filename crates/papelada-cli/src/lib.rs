//! Papelada CLI library.
//!
//! This library provides the core functionality for the Papelada command-line interface,
//! including configuration management, input loading, command execution, and output formatting.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod output;

pub use backend::AnyBackend;
pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
