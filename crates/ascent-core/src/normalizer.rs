//! Event normalizer
//!
//! Single entry point for every inbound source. Each event is validated,
//! applied to the metrics store as atomic increments or compare-and-set
//! writes, and then the progression engine is invoked for the project.

use crate::config::EngineConfig;
use crate::dispatch::Notifier;
use crate::engine::{Progress, ProgressionEngine};
use crate::error::{AscentError, AscentResult};
use crate::events::{parse_status_url, InboundEvent, MetricUpdate};
use ascent_classifier::{ActivityClassifier, Classification, CommunityMessage};
use ascent_metrics::{ActivityKind, ArtifactKind, LinkKind, MetricsStore, ProjectId};
use chrono::Utc;
use std::sync::Arc;

/// Effect of one event on the metrics store
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Message classified and counted
    Message(Classification),
    /// Message id already counted; nothing changed
    DuplicateMessage,
    /// Member count set
    MemberCount(u32),
    /// Automation confirmed and link verified
    AutomationConfirmed,
    /// Artifact appended
    Artifact(ArtifactKind),
    /// Social account connected
    SocialConnected,
    /// Introduction posts checked against the connected handle
    IntroPosts {
        /// Newly counted posts
        accepted: usize,
        /// URLs that are not status posts by the connected account
        rejected: Vec<String>,
        /// Posts already counted
        duplicates: usize,
    },
    /// Write-once link
    Link {
        /// Which link
        kind: LinkKind,
        /// `false` if the link was already set
        newly_set: bool,
    },
    /// Scientific profile
    VerifiedMember {
        /// `false` if the member was already counted
        newly_counted: bool,
    },
}

/// Outcome of ingesting one event
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Project the event targeted
    pub project_id: ProjectId,
    /// Store effect
    pub applied: Applied,
    /// Engine effect
    pub progress: Progress,
}

/// Validates events, applies them, and re-evaluates the project
#[derive(Debug)]
pub struct EventNormalizer {
    store: Arc<dyn MetricsStore>,
    classifier: ActivityClassifier,
    engine: Arc<ProgressionEngine>,
}

impl EventNormalizer {
    /// Create normalizer over an existing engine
    #[must_use]
    pub fn new(
        store: Arc<dyn MetricsStore>,
        classifier: ActivityClassifier,
        engine: Arc<ProgressionEngine>,
    ) -> Self {
        Self {
            store,
            classifier,
            engine,
        }
    }

    /// Wire store, classifier, engine and notifier from configuration
    #[must_use]
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn MetricsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = Arc::new(ProgressionEngine::new(config, Arc::clone(&store), notifier));
        Self::new(store, ActivityClassifier::new(config.classifier.clone()), engine)
    }

    /// Get progression engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Arc<ProgressionEngine> {
        &self.engine
    }

    /// Get activity classifier
    #[inline]
    #[must_use]
    pub fn classifier(&self) -> &ActivityClassifier {
        &self.classifier
    }

    /// Decode and ingest one JSON event
    ///
    /// # Errors
    /// See [`EventNormalizer::ingest`]
    pub async fn ingest_json(&self, payload: &str) -> AscentResult<IngestReport> {
        let event = InboundEvent::from_json(payload).map_err(|e| {
            tracing::warn!(error = %e, "event rejected");
            e
        })?;
        self.ingest(event).await
    }

    /// Validate, apply and re-evaluate
    ///
    /// # Errors
    /// - [`AscentError::Normalize`] for malformed events; nothing is mutated
    /// - [`AscentError::Store`] if the store fails; the event is not counted
    ///   and the transport should re-deliver it
    pub async fn ingest(&self, event: InboundEvent) -> AscentResult<IngestReport> {
        let kind = event.kind();
        let (project, update) = event.validate().map_err(|e| {
            tracing::warn!(kind, error = %e, "event rejected");
            AscentError::from(e)
        })?;

        let applied = self.apply(&project, update).await.map_err(|e| {
            tracing::warn!(%project, kind, error = %e, "event not applied");
            e
        })?;
        tracing::debug!(%project, kind, ?applied, "event applied");

        let progress = self.engine.advance(&project).await?;
        Ok(IngestReport {
            project_id: project,
            applied,
            progress,
        })
    }

    async fn apply(&self, project: &ProjectId, update: MetricUpdate) -> AscentResult<Applied> {
        let applied = match update {
            MetricUpdate::Message {
                community_id,
                message_id,
                author_id,
                text,
                attachments,
            } => {
                if self.store.has_seen_message(&community_id, &message_id).await? {
                    tracing::debug!(%project, message = %message_id, "duplicate message dropped");
                    return Ok(Applied::DuplicateMessage);
                }

                let message = CommunityMessage {
                    author_id,
                    project_id: project.clone(),
                    text,
                    attachments,
                };
                let now = Utc::now();
                let classification = self.classifier.classify(&message, now);
                let counted = self
                    .store
                    .apply_message(
                        project,
                        &community_id,
                        &message_id,
                        classification.counts,
                        classification.quality_delta,
                    )
                    .await?;

                if counted {
                    self.classifier.record(&message, &classification, now);
                    Applied::Message(classification)
                } else {
                    Applied::DuplicateMessage
                }
            }
            MetricUpdate::MemberCount {
                community_id,
                member_count,
            } => {
                self.store
                    .set_member_count(project, &community_id, member_count)
                    .await?;
                Applied::MemberCount(member_count)
            }
            MetricUpdate::Automation {
                community_id,
                member_count,
            } => {
                self.store
                    .confirm_automation(project, &community_id, member_count)
                    .await?;
                Applied::AutomationConfirmed
            }
            MetricUpdate::Artifact(kind) => {
                self.store.append_artifact(project, kind).await?;
                Applied::Artifact(kind)
            }
            MetricUpdate::SocialConnected(handle) => {
                self.store.connect_social(project, &handle).await?;
                Applied::SocialConnected
            }
            MetricUpdate::IntroPosts(urls) => self.verify_intro_posts(project, urls).await?,
            MetricUpdate::Link { kind, url } => {
                let newly_set = self.store.set_link_once(project, kind, &url).await?;
                if !newly_set {
                    tracing::debug!(%project, %kind, "link already set");
                }
                Applied::Link { kind, newly_set }
            }
            MetricUpdate::VerifiedMember(member) => {
                let newly_counted = self.store.record_verified_member(project, &member).await?;
                Applied::VerifiedMember { newly_counted }
            }
        };
        Ok(applied)
    }

    async fn verify_intro_posts(
        &self,
        project: &ProjectId,
        urls: Vec<String>,
    ) -> AscentResult<Applied> {
        let snapshot = self.store.snapshot(project).await?;
        let handle = snapshot
            .social
            .filter(|s| s.connected)
            .and_then(|s| s.handle);

        let mut accepted = 0;
        let mut duplicates = 0;
        let mut rejected = Vec::new();

        for url in urls.into_iter().filter(|u| !u.trim().is_empty()) {
            let post = handle
                .as_deref()
                .and_then(|h| parse_status_url(&url).filter(|p| p.is_by(h)));
            let Some(post) = post else {
                rejected.push(url);
                continue;
            };

            if self.store.record_intro_post(project, &post.status_id).await? {
                accepted += 1;
            } else {
                duplicates += 1;
            }
        }

        if !rejected.is_empty() {
            tracing::debug!(%project, rejected = rejected.len(), "intro posts rejected");
        }
        Ok(Applied::IntroPosts {
            accepted,
            rejected,
            duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TracingNotifier;
    use crate::error::NormalizeError;
    use ascent_metrics::{CommunityId, InMemoryMetricsStore, Level, MessageId, StoreError};

    fn normalizer() -> (Arc<InMemoryMetricsStore>, EventNormalizer) {
        let store = Arc::new(InMemoryMetricsStore::new());
        let normalizer = EventNormalizer::from_config(
            &EngineConfig::default(),
            Arc::clone(&store) as _,
            Arc::new(TracingNotifier),
        );
        (store, normalizer)
    }

    fn message(id: &str, text: &str) -> InboundEvent {
        InboundEvent::MessageArrived {
            project_id: ProjectId::from("p1"),
            community_id: CommunityId::from("c1"),
            author_id: "a1".into(),
            message_id: MessageId::from(id),
            text: text.to_string(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replayed_message_is_counted_once() {
        let (store, normalizer) = normalizer();
        let text = "Check out this result from our trial, full writeup at https://doi.org/10.1000/xyz";

        let first = normalizer.ingest(message("m1", text)).await.unwrap();
        let second = normalizer.ingest(message("m1", text)).await.unwrap();

        assert!(matches!(first.applied, Applied::Message(c) if c.counts == ActivityKind::Paper));
        assert_eq!(second.applied, Applied::DuplicateMessage);

        let snapshot = store.snapshot(&ProjectId::from("p1")).await.unwrap();
        assert_eq!(snapshot.papers_shared(), 1);
        assert_eq!(snapshot.messages_count(), 0);
    }

    #[tokio::test]
    async fn ignored_messages_are_not_counted() {
        let (store, normalizer) = normalizer();
        let report = normalizer.ingest(message("m1", "hey")).await.unwrap();

        assert!(matches!(report.applied, Applied::Message(c) if c.counts == ActivityKind::Ignored));
        let snapshot = store.snapshot(&ProjectId::from("p1")).await.unwrap();
        assert_eq!(snapshot.messages_count(), 0);
    }

    #[tokio::test]
    async fn malformed_event_mutates_nothing() {
        let (store, normalizer) = normalizer();
        let err = normalizer
            .ingest_json(r#"{"kind":"member_joined","projectId":"p1"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, AscentError::Normalize(NormalizeError::Malformed(_))));
        assert_eq!(store.project_count(), 0);
    }

    #[tokio::test]
    async fn community_mismatch_is_rejected() {
        let (_, normalizer) = normalizer();
        normalizer
            .ingest(InboundEvent::MemberJoined {
                project_id: ProjectId::from("p1"),
                community_id: CommunityId::from("c1"),
                new_member_count: 2,
            })
            .await
            .unwrap();

        let err = normalizer
            .ingest(InboundEvent::MemberJoined {
                project_id: ProjectId::from("p1"),
                community_id: CommunityId::from("other"),
                new_member_count: 9,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AscentError::Store(StoreError::CommunityMismatch { .. })
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn intro_posts_require_connected_handle() {
        let (store, normalizer) = normalizer();
        let project = ProjectId::from("p1");
        let urls = vec![
            "https://x.com/labbench/status/1".to_string(),
            "https://x.com/labbench/status/2".to_string(),
        ];

        let report = normalizer
            .ingest(InboundEvent::SocialPostsSubmitted {
                project_id: project.clone(),
                urls: urls.clone(),
            })
            .await
            .unwrap();
        assert!(matches!(
            report.applied,
            Applied::IntroPosts { accepted: 0, ref rejected, .. } if rejected.len() == 2
        ));

        normalizer
            .ingest(InboundEvent::SocialAccountConnected {
                project_id: project.clone(),
                handle: "@LabBench".to_string(),
            })
            .await
            .unwrap();

        let mut with_foreign = urls.clone();
        with_foreign.push("https://twitter.com/someone/status/3".to_string());
        with_foreign.push("https://twitter.com/LabBench/status/1".to_string());
        let report = normalizer
            .ingest(InboundEvent::SocialPostsSubmitted {
                project_id: project.clone(),
                urls: with_foreign,
            })
            .await
            .unwrap();

        assert_eq!(
            report.applied,
            Applied::IntroPosts {
                accepted: 2,
                rejected: vec!["https://twitter.com/someone/status/3".to_string()],
                duplicates: 1,
            }
        );
        let snapshot = store.snapshot(&project).await.unwrap();
        assert_eq!(snapshot.intro_post_count(), 2);
    }

    #[tokio::test]
    async fn artifacts_advance_first_level() {
        let (store, normalizer) = normalizer();
        let project = ProjectId::from("p1");

        let report = normalizer
            .ingest(InboundEvent::ArtifactMinted {
                project_id: project.clone(),
                artifact_type: ArtifactKind::Idea,
            })
            .await
            .unwrap();
        assert!(!report.progress.moved());

        let report = normalizer
            .ingest(InboundEvent::ArtifactMinted {
                project_id: project.clone(),
                artifact_type: ArtifactKind::Vision,
            })
            .await
            .unwrap();
        assert_eq!(report.progress.changes.len(), 1);
        assert_eq!(
            store.project(&project).await.unwrap().level,
            Level::new(2).unwrap()
        );
    }

    #[tokio::test]
    async fn verified_members_count_once() {
        let (store, normalizer) = normalizer();
        let event = InboundEvent::ScientificProfileVerified {
            project_id: ProjectId::from("p1"),
            member_id: "m1".into(),
        };

        let first = normalizer.ingest(event.clone()).await.unwrap();
        let second = normalizer.ingest(event).await.unwrap();

        assert_eq!(first.applied, Applied::VerifiedMember { newly_counted: true });
        assert_eq!(second.applied, Applied::VerifiedMember { newly_counted: false });
        let project = store.project(&ProjectId::from("p1")).await.unwrap();
        assert_eq!(project.verified_member_count, 1);
    }
}
