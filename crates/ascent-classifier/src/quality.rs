//! Per-author quality scoring
//!
//! Base score is `min(100, length / 5)`. Near-duplicates of the author's
//! recent messages (bigram Dice similarity) and bursts above the per-minute
//! cap are penalised multiplicatively.

use crate::config::ClassifierConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Base quality of a message of `chars` characters
#[inline]
#[must_use]
pub fn base_score(chars: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let score = chars as f64 / 5.0;
    score.min(100.0)
}

/// Bigram Dice similarity in `[0, 1]`, case-insensitive
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}

/// Recent counted messages of one author
#[derive(Debug, Clone, Default)]
pub struct AuthorHistory {
    recent: VecDeque<String>,
    sent_at: VecDeque<DateTime<Utc>>,
}

/// Penalties applied to one message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penalties {
    /// Highest similarity to a recent message, if above threshold
    pub near_duplicate: Option<f64>,
    /// Messages in the trailing minute, if above the cap
    pub throttled: Option<usize>,
}

impl AuthorHistory {
    /// Score `text` against this history without recording it
    #[must_use]
    pub fn score(
        &self,
        text: &str,
        now: DateTime<Utc>,
        config: &ClassifierConfig,
    ) -> (f64, Penalties) {
        let mut delta = base_score(text.trim().chars().count());

        let near_duplicate = self
            .recent
            .iter()
            .map(|previous| similarity(text, previous))
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
            .filter(|s| *s > config.similarity_threshold);
        if near_duplicate.is_some() {
            delta *= config.similarity_penalty;
        }

        let window_start = now - Duration::minutes(1);
        let in_window = self.sent_at.iter().filter(|t| **t > window_start).count() + 1;
        let throttled = (in_window > config.max_messages_per_minute).then_some(in_window);
        if throttled.is_some() {
            delta *= config.throttle_penalty;
        }

        (delta.clamp(0.0, 100.0), Penalties { near_duplicate, throttled })
    }

    /// Remember a counted message sent at `now`
    pub fn record(&mut self, text: &str, now: DateTime<Utc>, depth: usize) {
        self.recent.push_back(text.to_string());
        while self.recent.len() > depth {
            self.recent.pop_front();
        }

        let window_start = now - Duration::minutes(1);
        while self.sent_at.front().is_some_and(|t| *t <= window_start) {
            self.sent_at.pop_front();
        }
        self.sent_at.push_back(now);
    }

    /// Counted messages remembered for the throttle window
    #[must_use]
    pub fn in_window(&self) -> usize {
        self.sent_at.len()
    }
}
