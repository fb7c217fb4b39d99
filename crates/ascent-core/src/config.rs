//! Engine configuration
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! the defaults below.
//!
//! ```toml
//! max_steps_per_pass = 8
//!
//! [guard]
//! window_secs = 60
//! max_capacity = 100000
//!
//! [gates]
//! messages_count = 50
//!
//! [classifier]
//! max_messages_per_minute = 10
//! ```

use crate::error::ConfigError;
use ascent_classifier::ClassifierConfig;
use ascent_gate::GateThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Single steps from level 1 to completion: six level writes and the
/// completion marker
pub const MIN_STEPS_PER_PASS: usize = 7;

/// Idempotency guard tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Window during which a repeat trigger is suppressed
    pub window_secs: u64,
    /// Maximum memo entries held at once
    pub max_capacity: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_capacity: 100_000,
        }
    }
}

impl GuardConfig {
    /// Window as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Idempotency guard
    pub guard: GuardConfig,
    /// Gate thresholds
    pub gates: GateThresholds,
    /// Activity classifier
    pub classifier: ClassifierConfig,
    /// Single-step transitions attempted per `advance` call, at least
    /// [`MIN_STEPS_PER_PASS`] so one call always catches a project up fully
    pub max_steps_per_pass: usize,
    /// Buffered level-change events per live subscriber
    pub live_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            gates: GateThresholds::default(),
            classifier: ClassifierConfig::default(),
            max_steps_per_pass: 8,
            live_channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With idempotency window
    #[inline]
    #[must_use]
    pub fn with_guard_window(mut self, window: Duration) -> Self {
        self.guard.window_secs = window.as_secs();
        self
    }

    /// With gate thresholds
    #[inline]
    #[must_use]
    pub fn with_gates(mut self, gates: GateThresholds) -> Self {
        self.gates = gates;
        self
    }

    /// With classifier tuning
    #[inline]
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Parse or range errors
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// IO, parse or range errors
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check ranges
    ///
    /// # Errors
    /// The first invalid section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guard.window_secs == 0 {
            return Err(ConfigError::Zero("guard.window_secs"));
        }
        if self.guard.max_capacity == 0 {
            return Err(ConfigError::Zero("guard.max_capacity"));
        }
        if self.max_steps_per_pass < MIN_STEPS_PER_PASS {
            return Err(ConfigError::StepBudget {
                value: self.max_steps_per_pass,
                min: MIN_STEPS_PER_PASS,
            });
        }
        if self.live_channel_capacity == 0 {
            return Err(ConfigError::Zero("live_channel_capacity"));
        }
        self.gates.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}
