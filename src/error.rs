//! Error types for range processing.
//!
//! The stint and consumption algorithms themselves never fail: missing channels,
//! bad lap times and run changes all degrade to a no-op or a reset. Errors only
//! surface at the edges of the crate:
//!
//! - **Configuration**: reading and validating a [`ServiceConfig`](crate::ServiceConfig)
//! - **Collaborators**: a [`StintSink`](crate::StintSink) or
//!   [`ChannelPublisher`](crate::ChannelPublisher) rejecting a commit
//! - **Tasks**: a per-car task failing inside a fan-out batch
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use pitwall_range::RangeError;
//!
//! let error = RangeError::persist_failed("database unavailable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for range operations.
pub type Result<T, E = RangeError> = std::result::Result<T, E>;

/// Main error type for range operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RangeError {
    #[error("Config file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Failed to persist stints: {reason}")]
    Persist {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to publish channel data: {reason}")]
    Publish {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Car '{car_number}' is not configured for this event")]
    UnknownCar { car_number: String },

    #[error("Car task failed: {details}")]
    Task { details: String },
}

impl RangeError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RangeError::Persist { .. } => true,
            RangeError::Publish { .. } => true,
            RangeError::Task { .. } => true,
            RangeError::File { .. } => false,
            RangeError::Config { .. } => false,
            RangeError::UnknownCar { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RangeError::File { .. } => vec![
                "Check the config file exists and is readable",
                "Verify the path passed to ServiceConfig::load",
            ],
            RangeError::Config { .. } => vec![
                "Check car numbers and device ids are unique",
                "Ensure poll and commit intervals are greater than zero",
                "Verify fuel capacity is not negative",
            ],
            RangeError::Persist { .. } => vec![
                "Check the persistence backend is reachable",
                "Dirty cars are retried on the next commit interval",
            ],
            RangeError::Publish { .. } => vec![
                "Check the message bus connection",
                "Derived channels are recomputed on the next lap",
            ],
            RangeError::UnknownCar { .. } => vec![
                "Add the car to the event configuration",
                "Check the channel mapping for the device id",
            ],
            RangeError::Task { .. } => vec![
                "Inspect the logs for the failing car",
                "Other cars in the batch are unaffected",
            ],
        }
    }

    /// Helper constructor for config file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RangeError::File { path, source }
    }

    /// Helper constructor for configuration validation errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        RangeError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for persistence failures.
    pub fn persist_failed(reason: impl Into<String>) -> Self {
        RangeError::Persist { reason: reason.into(), source: None }
    }

    /// Helper constructor for persistence failures with source.
    pub fn persist_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RangeError::Persist { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for publish failures.
    pub fn publish_failed(reason: impl Into<String>) -> Self {
        RangeError::Publish { reason: reason.into(), source: None }
    }

    /// Helper constructor for task failures.
    pub fn task_failed(details: impl Into<String>) -> Self {
        RangeError::Task { details: details.into() }
    }
}

impl From<std::io::Error> for RangeError {
    fn from(err: std::io::Error) -> Self {
        RangeError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for RangeError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        RangeError::Config { context: "YAML deserialization".to_string(), details: err.to_string() }
    }
}

impl From<tokio::task::JoinError> for RangeError {
    fn from(err: tokio::task::JoinError) -> Self {
        RangeError::Task { details: err.to_string() }
    }
}
