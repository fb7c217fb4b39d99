//! Error types for Ascent Core
//!
//! Provides error handling for:
//! - Malformed inbound events (rejected at the normalizer boundary)
//! - Notification delivery failures (logged, never propagated)
//! - Configuration loading
//! - Metrics store failures surfaced to the transport layer

use ascent_classifier::ClassifierConfigError;
use ascent_gate::ThresholdError;
use ascent_metrics::StoreError;
use std::path::PathBuf;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum AscentError {
    /// Event rejected at the normalizer boundary
    #[error("event rejected: {0}")]
    Normalize(#[from] NormalizeError),

    /// Metrics store failed; the event was not counted
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AscentError {
    /// Check if re-delivering the same event may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// Inbound event failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Payload could not be decoded
    #[error("malformed event: {0}")]
    Malformed(String),

    /// Required field absent or blank
    #[error("{kind} event is missing required field '{field}'")]
    MissingField {
        /// Event kind
        kind: &'static str,
        /// Field name
        field: &'static str,
    },

    /// URL field is not an absolute http(s) URL
    #[error("{kind} event has invalid url '{url}'")]
    InvalidUrl {
        /// Event kind
        kind: &'static str,
        /// Offending value
        url: String,
    },
}

impl NormalizeError {
    /// Create missing field error
    #[inline]
    #[must_use]
    pub fn missing(kind: &'static str, field: &'static str) -> Self {
        Self::MissingField { kind, field }
    }
}

/// Notification or email delivery failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Collaborator reported a failure
    #[error("{channel} delivery failed: {reason}")]
    Delivery {
        /// `message` or `email`
        channel: &'static str,
        /// Collaborator's reason
        reason: String,
    },

    /// Collaborator is not reachable
    #[error("{0} channel unavailable")]
    Unavailable(&'static str),
}

impl DispatchError {
    /// Create delivery error
    pub fn delivery(channel: &'static str, reason: impl Into<String>) -> Self {
        Self::Delivery {
            channel,
            reason: reason.into(),
        }
    }
}

/// Configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Gate thresholds invalid
    #[error("gate thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    /// Classifier tuning invalid
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierConfigError),

    /// Value that must be positive was zero
    #[error("'{0}' must be greater than zero")]
    Zero(&'static str),

    /// Step budget too small to carry a project through every gate in one pass
    #[error("max_steps_per_pass = {value} is below the {min} steps of a full journey")]
    StepBudget {
        /// Configured budget
        value: usize,
        /// Smallest accepted budget
        min: usize,
    },
}

/// Result type alias for core operations
pub type AscentResult<T> = Result<T, AscentError>;
