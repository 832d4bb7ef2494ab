//! Error taxonomy for the Audio2Face client
//!
//! Network and decode failures of individual REST calls are normally carried
//! as [`RequestResult`](crate::gateway::RequestResult) values. The variants
//! here cover what callers must react to: missing installations, local
//! precondition failures, readiness timeouts and broken streams.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for all client operations
#[derive(Error, Debug)]
pub enum A2fError {
    #[error("Audio2Face installation not found: {path}")]
    InstallationNotFound { path: PathBuf },

    #[error("Failed to launch {path}: {source}")]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Transport error calling {route}: {cause}")]
    Transport { route: String, cause: String },

    #[error("Response of {route} is not JSON: {body}")]
    Decode { route: String, body: String },

    #[error("Server not ready after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Track not found: {path}")]
    TrackNotFound { path: PathBuf },

    #[error("Scene {scene} was not loaded: {reason}")]
    SceneLoad { scene: String, reason: String },

    #[error("Blendshape export to {path} reported failure: {message}")]
    ExportReportedFailure { path: PathBuf, message: String },

    #[error("Streaming transport is unavailable in this build")]
    StreamingUnavailable,

    #[error("Stream failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid value: {0}")]
    Domain(#[from] a2f_domain::DomainError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error in {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation error: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Configuration write failed: {path} - {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, A2fError>;

/// Helper trait for attaching a path to `std::io::Error`
pub trait IoErrorExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| A2fError::Io {
            path: path.into(),
            source,
        })
    }
}

/// Helper function to create validation errors
pub fn config_error(field: &str, reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
