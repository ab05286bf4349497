//! Error types for the kiosk pipeline

use crate::pipeline::PipelineState;
use thiserror::Error;

/// Result type alias for kiosk operations
pub type KioskResult<T> = Result<T, KioskError>;

/// Failures of a remote call. The client never retries.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

/// Errors surfaced by the capture manager and the pipeline orchestrator.
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Network error: {0}")]
    Network(#[from] ServiceError),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("{operation} is not allowed while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("Missing values for: {}", .0.join(", "))]
    IncompleteForm(Vec<String>),

    #[error("Unknown form field: {0}")]
    UnknownField(String),

    #[error("Registration was not accepted")]
    Registration,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
