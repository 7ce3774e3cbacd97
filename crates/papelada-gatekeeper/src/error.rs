//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur during gatekeeper operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatekeeperError {
    /// Pattern failed to compile or exceeds configured limits
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
