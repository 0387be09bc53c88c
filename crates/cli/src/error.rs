//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] contracts::ContractError),

    /// Sink registry could not be built
    #[error("Failed to build sinks: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// Input adapter failed to start or stopped with an error
    #[error("Input adapter failed: {0}")]
    Ingestion(#[from] ingestion::IngestionError),

    /// Graceful shutdown error
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
