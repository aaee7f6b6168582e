//! Error types for TLS Advisor

use std::io;
use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Main error type for TLS Advisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Certificate bundle could not be read or decoded
    #[error("Certificate bundle error: {0}")]
    Bundle(String),

    /// Network error (test probes, admin server)
    #[error("Network error: {0}")]
    Network(String),

    /// Feature not available
    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}
