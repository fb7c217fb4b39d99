//! Idempotency guard using moka
//!
//! Short-lived `(project, milestone) -> first fired at` memo. It suppresses
//! duplicate notification side effects only; the level write is protected by
//! the store's compare-and-set and never consults this memo. Losing an entry
//! (expiry, eviction, restart) can at worst re-send a notification.

use crate::config::GuardConfig;
use ascent_gate::Milestone;
use ascent_metrics::ProjectId;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::time::Duration;

/// Per-(project, milestone) side-effect memo with a fixed window
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    memo: Cache<(ProjectId, Milestone), DateTime<Utc>>,
    window: Duration,
}

impl IdempotencyGuard {
    /// Create guard with a window and capacity
    #[inline]
    #[must_use]
    pub fn new(window: Duration, max_capacity: u64) -> Self {
        Self {
            memo: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(window)
                .build(),
            window,
        }
    }

    /// Create guard from configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.window(), config.max_capacity)
    }

    /// Claim the side effects of `milestone` for `project`
    ///
    /// Returns `true` for exactly one caller per window; concurrent callers
    /// racing on the same key observe a single insertion.
    pub async fn should_fire(&self, project: &ProjectId, milestone: Milestone) -> bool {
        let entry = self
            .memo
            .entry((project.clone(), milestone))
            .or_insert_with(async { Utc::now() })
            .await;
        let fire = entry.is_fresh();
        if !fire {
            tracing::debug!(
                %project,
                %milestone,
                first_fired = %entry.value(),
                "side effects already fired within window"
            );
        }
        fire
    }

    /// When side effects for the key were first claimed, if still in window
    pub async fn fired_at(&self, project: &ProjectId, milestone: Milestone) -> Option<DateTime<Utc>> {
        self.memo.get(&(project.clone(), milestone)).await
    }

    /// Drop the memo for one key
    #[inline]
    pub async fn forget(&self, project: &ProjectId, milestone: Milestone) {
        self.memo.invalidate(&(project.clone(), milestone)).await;
    }

    /// Get window
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.memo.entry_count()
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}
