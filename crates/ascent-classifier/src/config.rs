//! Classifier tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Invalid classifier configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierConfigError {
    /// Similarity threshold outside `(0, 1]`
    #[error("similarity threshold {0} outside (0, 1]")]
    SimilarityThreshold(f64),

    /// Penalty factor outside `[0, 1]`
    #[error("penalty factor '{name}' = {value} outside [0, 1]")]
    PenaltyFactor {
        /// Field name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Per-minute cap of zero would throttle every message
    #[error("per-minute message cap must be greater than zero")]
    ZeroMessageCap,

    /// Author history limit of zero would keep no history
    #[error("'{0}' must be greater than zero")]
    ZeroHistoryLimit(&'static str),
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Messages shorter than this many characters are ignored
    pub min_length: usize,
    /// Messages with fewer words than this are ignored
    pub min_words: usize,
    /// Previous messages per author kept for similarity checks
    pub history_depth: usize,
    /// Dice similarity above which a message counts as a near-duplicate
    pub similarity_threshold: f64,
    /// Multiplier applied to the delta of a near-duplicate
    pub similarity_penalty: f64,
    /// Counted messages per author per minute before throttling
    pub max_messages_per_minute: usize,
    /// Multiplier applied to the delta of a throttled message
    pub throttle_penalty: f64,
    /// PDF attachments at least this large are treated as scientific documents
    pub min_document_bytes: u64,
    /// Seconds without a counted message before an author's history expires
    pub author_idle_secs: u64,
    /// Maximum authors with history held at once
    pub max_tracked_authors: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_length: 15,
            min_words: 3,
            history_depth: 5,
            similarity_threshold: 0.8,
            similarity_penalty: 0.2,
            max_messages_per_minute: 10,
            throttle_penalty: 0.5,
            min_document_bytes: 250 * 1024,
            author_idle_secs: 3600,
            max_tracked_authors: 100_000,
        }
    }
}

impl ClassifierConfig {
    /// Author history idle expiry as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn author_idle(&self) -> Duration {
        Duration::from_secs(self.author_idle_secs)
    }

    /// Check ranges
    ///
    /// # Errors
    /// The first out-of-range field
    pub fn validate(&self) -> Result<(), ClassifierConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ClassifierConfigError::SimilarityThreshold(
                self.similarity_threshold,
            ));
        }
        for (name, value) in [
            ("similarity_penalty", self.similarity_penalty),
            ("throttle_penalty", self.throttle_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ClassifierConfigError::PenaltyFactor { name, value });
            }
        }
        if self.max_messages_per_minute == 0 {
            return Err(ClassifierConfigError::ZeroMessageCap);
        }
        if self.author_idle_secs == 0 {
            return Err(ClassifierConfigError::ZeroHistoryLimit("author_idle_secs"));
        }
        if self.max_tracked_authors == 0 {
            return Err(ClassifierConfigError::ZeroHistoryLimit("max_tracked_authors"));
        }
        Ok(())
    }
}
