//! Errors raised by the netsdr binary

use netsdr_lib::errors::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// I/O error during application execution.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a YAML configuration.
    #[error("Failed with config parsing: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}
