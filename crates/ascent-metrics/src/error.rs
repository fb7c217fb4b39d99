//! Error types for the metrics store
//!
//! Covers:
//! - Level values outside the fixed range
//! - Store availability failures
//! - Record binding conflicts and backward level writes

use crate::types::{CommunityId, Level, ProjectId};

/// Level value outside `[1, 7]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("level {0} outside the range 1..=7")]
pub struct LevelError(pub u8);

/// Errors raised by a [`MetricsStore`](crate::MetricsStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backing store cannot be reached; the caller relies on transport re-delivery
    #[error("metrics store unavailable: {0}")]
    Unavailable(String),

    /// Project has a community record bound to another community
    #[error("project {project} is bound to community {bound}, not {requested}")]
    CommunityMismatch {
        /// Project the event targeted
        project: ProjectId,
        /// Community already bound to the project
        bound: CommunityId,
        /// Community named by the event
        requested: CommunityId,
    },

    /// Level write that would not move the project forward
    #[error("non-monotonic level write for project {project}: {from} -> {to}")]
    NonMonotonic {
        /// Affected project
        project: ProjectId,
        /// Level the writer expected
        from: Level,
        /// Level the writer asked for
        to: Level,
    },
}

impl StoreError {
    /// Create unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Check if the failed operation may succeed on re-delivery
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
