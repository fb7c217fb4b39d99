//! Activity classifier
//!
//! Turns one inbound community message into a classification and a quality
//! delta. It never touches the counters; the caller applies the result.

use crate::config::ClassifierConfig;
use crate::patterns::{detect_paper, low_value_reason, Attachment, IgnoreReason, PaperSignal};
use crate::quality::AuthorHistory;
use ascent_metrics::{ActivityKind, AuthorId, ProjectId};
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use moka::Entry;
use serde::{Deserialize, Serialize};

/// Message as seen by the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMessage {
    /// Author
    pub author_id: AuthorId,
    /// Owning project
    pub project_id: ProjectId,
    /// Message body
    pub text: String,
    /// Attached files
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Counter the message feeds
    pub counts: ActivityKind,
    /// Quality delta; zero unless `counts` is [`ActivityKind::Message`]
    pub quality_delta: f64,
    /// Detector that recognised a paper
    pub paper_signal: Option<PaperSignal>,
    /// Why the message was ignored
    pub ignore_reason: Option<IgnoreReason>,
}

impl Classification {
    fn paper(signal: PaperSignal) -> Self {
        Self {
            counts: ActivityKind::Paper,
            quality_delta: 0.0,
            paper_signal: Some(signal),
            ignore_reason: None,
        }
    }

    fn ignored(reason: IgnoreReason) -> Self {
        Self {
            counts: ActivityKind::Ignored,
            quality_delta: 0.0,
            paper_signal: None,
            ignore_reason: Some(reason),
        }
    }

    fn message(quality_delta: f64) -> Self {
        Self {
            counts: ActivityKind::Message,
            quality_delta,
            paper_signal: None,
            ignore_reason: None,
        }
    }
}

/// Classifier with per-author history for similarity and frequency checks
///
/// History lives in a bounded cache; an author idle for
/// [`ClassifierConfig::author_idle_secs`] starts over with a clean slate.
#[derive(Debug)]
pub struct ActivityClassifier {
    config: ClassifierConfig,
    authors: Cache<(ProjectId, AuthorId), AuthorHistory>,
}

impl ActivityClassifier {
    /// Create classifier with custom configuration
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        let authors = Cache::builder()
            .max_capacity(config.max_tracked_authors)
            .time_to_idle(config.author_idle())
            .build();
        Self { config, authors }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one message received at `now`
    ///
    /// Reads the author's history but never changes it. Once the message is
    /// known to be counted, hand it to [`ActivityClassifier::record`].
    #[must_use]
    pub fn classify(&self, message: &CommunityMessage, now: DateTime<Utc>) -> Classification {
        if let Some(signal) = detect_paper(&message.text, &message.attachments, &self.config) {
            tracing::debug!(
                project = %message.project_id,
                author = %message.author_id,
                ?signal,
                "message classified as paper"
            );
            return Classification::paper(signal);
        }

        if let Some(reason) = low_value_reason(&message.text, &self.config) {
            tracing::debug!(
                project = %message.project_id,
                author = %message.author_id,
                ?reason,
                "message ignored"
            );
            return Classification::ignored(reason);
        }

        let key = (message.project_id.clone(), message.author_id.clone());
        let (delta, penalties) = self
            .authors
            .get(&key)
            .unwrap_or_default()
            .score(&message.text, now, &self.config);

        if penalties.near_duplicate.is_some() || penalties.throttled.is_some() {
            tracing::debug!(
                project = %message.project_id,
                author = %message.author_id,
                near_duplicate = ?penalties.near_duplicate,
                throttled = ?penalties.throttled,
                delta,
                "quality penalty applied"
            );
        }

        Classification::message(delta)
    }

    /// Add a counted message to its author's history
    ///
    /// Only ordinary messages feed the similarity and frequency checks.
    pub fn record(
        &self,
        message: &CommunityMessage,
        classification: &Classification,
        now: DateTime<Utc>,
    ) {
        if classification.counts != ActivityKind::Message {
            return;
        }
        let depth = self.config.history_depth;
        self.authors
            .entry((message.project_id.clone(), message.author_id.clone()))
            .and_upsert_with(|existing| {
                let mut history = existing.map(Entry::into_value).unwrap_or_default();
                history.record(&message.text, now, depth);
                history
            });
    }

    /// Authors with history, after pending expirations are applied
    #[must_use]
    pub fn tracked_authors(&self) -> u64 {
        self.authors.run_pending_tasks();
        self.authors.entry_count()
    }
}

impl Default for ActivityClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(author: &str, text: &str) -> CommunityMessage {
        CommunityMessage {
            author_id: AuthorId::from(author),
            project_id: ProjectId::from("p1"),
            text: text.to_string(),
            attachments: Vec::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn counted(
        classifier: &ActivityClassifier,
        msg: &CommunityMessage,
        at: DateTime<Utc>,
    ) -> Classification {
        let result = classifier.classify(msg, at);
        classifier.record(msg, &result, at);
        result
    }

    #[test]
    fn greeting_is_ignored() {
        let classifier = ActivityClassifier::default();
        let result = classifier.classify(&message("a", "hey"), now());

        assert_eq!(result.counts, ActivityKind::Ignored);
        assert_eq!(result.ignore_reason, Some(IgnoreReason::Greeting));
        assert_eq!(classifier.tracked_authors(), 0);
    }

    #[test]
    fn publisher_link_is_paper() {
        let classifier = ActivityClassifier::default();
        let result = classifier.classify(
            &message(
                "a",
                "Check out this result from our trial, full writeup at https://doi.org/10.1000/xyz",
            ),
            now(),
        );

        assert_eq!(result.counts, ActivityKind::Paper);
        assert!(result.quality_delta.abs() < f64::EPSILON);
    }

    #[test]
    fn arxiv_attachment_is_paper_even_with_greeting() {
        let classifier = ActivityClassifier::default();
        let mut msg = message("a", "hi");
        msg.attachments.push(Attachment::new("2504.11091.pdf", 812_000));

        let result = classifier.classify(&msg, now());
        assert_eq!(result.counts, ActivityKind::Paper);
        assert_eq!(result.paper_signal, Some(PaperSignal::Attachment));
    }

    #[test]
    fn ordinary_message_scores_by_length() {
        let classifier = ActivityClassifier::default();
        let result = classifier.classify(
            &message("fresh", "The assay results look promising so far!"),
            now(),
        );

        assert_eq!(result.counts, ActivityKind::Message);
        assert!((result.quality_delta - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_is_per_author() {
        let classifier = ActivityClassifier::default();
        let text = "We should rerun the western blot tomorrow morning";

        let first = counted(&classifier, &message("a", text), now());
        let other_author = counted(&classifier, &message("b", text), now());
        let repeat = counted(&classifier, &message("a", text), now() + Duration::seconds(5));

        assert!((first.quality_delta - other_author.quality_delta).abs() < f64::EPSILON);
        assert!(repeat.quality_delta < first.quality_delta);
    }

    #[test]
    fn unrecorded_messages_do_not_penalise_author() {
        let classifier = ActivityClassifier::new(ClassifierConfig {
            max_messages_per_minute: 1,
            ..ClassifierConfig::default()
        });
        let text = "Sequencing run finished without errors overnight";

        let first = classifier.classify(&message("a", text), now());
        let again = classifier.classify(&message("a", text), now());

        assert_eq!(first, again);
        assert_eq!(classifier.tracked_authors(), 0);
    }

    #[test]
    fn ignored_and_paper_messages_are_not_recorded() {
        let classifier = ActivityClassifier::default();
        counted(&classifier, &message("a", "thanks"), now());
        counted(
            &classifier,
            &message("a", "New preprint https://arxiv.org/abs/2504.11091 on binding assays"),
            now(),
        );

        assert_eq!(classifier.tracked_authors(), 0);
    }

    #[test]
    fn idle_author_history_expires() {
        let classifier = ActivityClassifier::new(ClassifierConfig {
            author_idle_secs: 1,
            ..ClassifierConfig::default()
        });
        let text = "Sequencing run finished without errors overnight";

        let first = counted(&classifier, &message("a", text), now());
        assert_eq!(classifier.tracked_authors(), 1);

        std::thread::sleep(std::time::Duration::from_millis(1_200));

        let after_idle = classifier.classify(&message("a", text), now() + Duration::seconds(5));
        assert!((after_idle.quality_delta - first.quality_delta).abs() < f64::EPSILON);
        assert_eq!(classifier.tracked_authors(), 0);
    }
}
