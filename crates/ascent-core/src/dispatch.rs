//! Notification dispatch
//!
//! Requests the user-facing message and the transactional email for a
//! milestone, and forwards level changes to live sessions. Delivery belongs
//! to the [`Notifier`] collaborator; failures are logged here and never
//! reach the caller.

use crate::error::DispatchError;
use ascent_gate::Milestone;
use ascent_metrics::{Level, LevelChanged, ProjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use ulid::Ulid;

/// Outbound notification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequested {
    /// Request id
    pub id: Ulid,
    /// Target project
    pub project_id: ProjectId,
    /// Message template
    pub template_id: String,
    /// Milestone announced
    pub milestone: Milestone,
    /// Level the project is at after the milestone
    pub level: Level,
    /// When the request was created
    pub requested_at: DateTime<Utc>,
}

impl NotificationRequested {
    /// Create request for a milestone
    #[must_use]
    pub fn new(project_id: ProjectId, milestone: Milestone) -> Self {
        let level = match milestone {
            Milestone::Level(level) => level,
            Milestone::Complete => Level::LAST,
        };
        Self {
            id: Ulid::new(),
            project_id,
            template_id: milestone.template_id(),
            milestone,
            level,
            requested_at: Utc::now(),
        }
    }
}

/// Delivery collaborator for messages and emails
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post the user-visible message
    async fn send_message(&self, request: &NotificationRequested) -> Result<(), DispatchError>;

    /// Request the transactional email
    async fn send_email(&self, request: &NotificationRequested) -> Result<(), DispatchError>;
}

/// Notifier that only logs; used when no delivery channel is wired
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_message(&self, request: &NotificationRequested) -> Result<(), DispatchError> {
        tracing::info!(
            project = %request.project_id,
            template = %request.template_id,
            id = %request.id,
            "message requested"
        );
        Ok(())
    }

    async fn send_email(&self, request: &NotificationRequested) -> Result<(), DispatchError> {
        tracing::info!(
            project = %request.project_id,
            template = %request.template_id,
            id = %request.id,
            "email requested"
        );
        Ok(())
    }
}

/// What happened to one notification request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Message accepted by the collaborator
    pub message_sent: bool,
    /// Email accepted by the collaborator
    pub email_sent: bool,
}

/// Fan-out point for transition side effects
pub struct NotificationDispatch {
    notifier: Arc<dyn Notifier>,
    live: broadcast::Sender<LevelChanged>,
}

impl fmt::Debug for NotificationDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatch")
            .field("live_sessions", &self.live.receiver_count())
            .finish_non_exhaustive()
    }
}

impl NotificationDispatch {
    /// Create dispatch with a live channel of `capacity` events
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (live, _) = broadcast::channel(capacity.max(1));
        Self { notifier, live }
    }

    /// Request message and email; each failure is logged independently
    pub async fn notify(&self, request: &NotificationRequested) -> DispatchReport {
        let (message, email) = tokio::join!(
            self.notifier.send_message(request),
            self.notifier.send_email(request)
        );

        let report = DispatchReport {
            message_sent: log_outcome(request, "message", message),
            email_sent: log_outcome(request, "email", email),
        };
        tracing::debug!(
            project = %request.project_id,
            milestone = %request.milestone,
            ?report,
            "notification dispatched"
        );
        report
    }

    /// Forward a level change to live sessions; returns receivers reached
    pub fn publish(&self, change: &LevelChanged) -> usize {
        // Err only means no session is listening
        self.live.send(change.clone()).unwrap_or(0)
    }

    /// Attach a live session
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LevelChanged> {
        self.live.subscribe()
    }

    /// Currently attached live sessions
    #[inline]
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live.receiver_count()
    }
}

fn log_outcome(
    request: &NotificationRequested,
    channel: &'static str,
    outcome: Result<(), DispatchError>,
) -> bool {
    match outcome {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(
                project = %request.project_id,
                template = %request.template_id,
                channel,
                %error,
                "notification delivery failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NotificationRequested {
        NotificationRequested::new(
            ProjectId::from("p1"),
            Milestone::Level(Level::new(4).unwrap()),
        )
    }

    #[test]
    fn request_carries_template() {
        let req = request();
        assert_eq!(req.template_id, "level-4-reached");
        assert_eq!(req.level.value(), 4);

        let done = NotificationRequested::new(ProjectId::from("p1"), Milestone::Complete);
        assert_eq!(done.template_id, "journey-complete");
        assert_eq!(done.level, Level::LAST);
    }

    #[tokio::test]
    async fn sends_message_and_email() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_message()
            .withf(|r| r.template_id == "level-4-reached")
            .times(1)
            .returning(|_| Ok(()));
        notifier.expect_send_email().times(1).returning(|_| Ok(()));

        let dispatch = NotificationDispatch::new(Arc::new(notifier), 8);
        let report = dispatch.notify(&request()).await;

        assert!(report.message_sent);
        assert!(report.email_sent);
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_message()
            .times(1)
            .returning(|_| Err(DispatchError::Unavailable("message")));
        notifier
            .expect_send_email()
            .times(1)
            .returning(|_| Err(DispatchError::delivery("email", "bounced")));

        let dispatch = NotificationDispatch::new(Arc::new(notifier), 8);
        let report = dispatch.notify(&request()).await;

        assert_eq!(
            report,
            DispatchReport {
                message_sent: false,
                email_sent: false
            }
        );
    }

    #[tokio::test]
    async fn email_failure_does_not_block_message() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send_message().times(1).returning(|_| Ok(()));
        notifier
            .expect_send_email()
            .times(1)
            .returning(|_| Err(DispatchError::delivery("email", "quota")));

        let dispatch = NotificationDispatch::new(Arc::new(notifier), 8);
        let report = dispatch.notify(&request()).await;

        assert!(report.message_sent);
        assert!(!report.email_sent);
    }

    #[tokio::test]
    async fn live_sessions_receive_changes() {
        let dispatch = NotificationDispatch::new(Arc::new(TracingNotifier), 8);
        let change = LevelChanged {
            project_id: ProjectId::from("p1"),
            previous_level: Level::FIRST,
            new_level: Level::new(2).unwrap(),
            at: Utc::now(),
        };

        assert_eq!(dispatch.publish(&change), 0);

        let mut session = dispatch.subscribe();
        assert_eq!(dispatch.live_sessions(), 1);
        assert_eq!(dispatch.publish(&change), 1);
        assert_eq!(session.recv().await.unwrap(), change);
    }
}
