//! Testing utilities for the Ascent workspace
//!
//! Shared notifiers, stores, event builders and fixtures.

#![allow(missing_docs)]

use ascent_core::{
    DispatchError, EngineConfig, EventNormalizer, InboundEvent, NotificationRequested, Notifier,
};
use ascent_metrics::{
    ActivityKind, ArtifactKind, CommunityId, CommunityRecord, InMemoryMetricsStore, Level,
    LevelChanged, LinkKind, MemberId, MessageId, MetricsSnapshot, MetricsStore, Project,
    ProjectId, SocialRecord, StoreError, StoreResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const PROJECT: &str = "proj-1";
pub const COMMUNITY: &str = "guild-1";
pub const HANDLE: &str = "labbench";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Message,
    Email,
}

/// Notifier that records every request
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Channel, NotificationRequested)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<NotificationRequested> {
        self.on(Channel::Message)
    }

    pub fn emails(&self) -> Vec<NotificationRequested> {
        self.on(Channel::Email)
    }

    pub fn templates(&self) -> Vec<String> {
        self.messages().into_iter().map(|r| r.template_id).collect()
    }

    pub fn count(&self, project: &str, template: &str) -> usize {
        self.messages()
            .iter()
            .filter(|r| r.project_id.as_str() == project && r.template_id == template)
            .count()
    }

    fn on(&self, channel: Channel) -> Vec<NotificationRequested> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, request: &NotificationRequested) -> Result<(), DispatchError> {
        self.sent.lock().push((Channel::Message, request.clone()));
        Ok(())
    }

    async fn send_email(&self, request: &NotificationRequested) -> Result<(), DispatchError> {
        self.sent.lock().push((Channel::Email, request.clone()));
        Ok(())
    }
}

/// Notifier whose deliveries always fail, counting attempts
#[derive(Debug, Default)]
pub struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_message(&self, _request: &NotificationRequested) -> Result<(), DispatchError> {
        *self.attempts.lock() += 1;
        Err(DispatchError::Unavailable("message"))
    }

    async fn send_email(&self, _request: &NotificationRequested) -> Result<(), DispatchError> {
        *self.attempts.lock() += 1;
        Err(DispatchError::delivery("email", "smtp relay refused"))
    }
}

/// Store that cannot be reached
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::unavailable("connection refused"))
}

#[async_trait]
impl MetricsStore for UnavailableStore {
    async fn project(&self, _: &ProjectId) -> StoreResult<Project> {
        down()
    }

    async fn snapshot(&self, _: &ProjectId) -> StoreResult<MetricsSnapshot> {
        down()
    }

    async fn has_seen_message(&self, _: &CommunityId, _: &MessageId) -> StoreResult<bool> {
        down()
    }

    async fn apply_message(
        &self,
        _: &ProjectId,
        _: &CommunityId,
        _: &MessageId,
        _: ActivityKind,
        _: f64,
    ) -> StoreResult<bool> {
        down()
    }

    async fn set_member_count(
        &self,
        _: &ProjectId,
        _: &CommunityId,
        _: u32,
    ) -> StoreResult<CommunityRecord> {
        down()
    }

    async fn confirm_automation(
        &self,
        _: &ProjectId,
        _: &CommunityId,
        _: u32,
    ) -> StoreResult<CommunityRecord> {
        down()
    }

    async fn append_artifact(&self, _: &ProjectId, _: ArtifactKind) -> StoreResult<()> {
        down()
    }

    async fn connect_social(&self, _: &ProjectId, _: &str) -> StoreResult<SocialRecord> {
        down()
    }

    async fn record_intro_post(&self, _: &ProjectId, _: &str) -> StoreResult<bool> {
        down()
    }

    async fn set_link_once(&self, _: &ProjectId, _: LinkKind, _: &str) -> StoreResult<bool> {
        down()
    }

    async fn record_verified_member(&self, _: &ProjectId, _: &MemberId) -> StoreResult<bool> {
        down()
    }

    async fn compare_and_set_level(
        &self,
        _: &ProjectId,
        _: Level,
        _: Level,
    ) -> StoreResult<Option<LevelChanged>> {
        down()
    }

    async fn mark_completed(&self, _: &ProjectId) -> StoreResult<bool> {
        down()
    }

    async fn transitions(&self, _: &ProjectId) -> StoreResult<Vec<LevelChanged>> {
        down()
    }

    async fn projects(&self) -> StoreResult<Vec<ProjectId>> {
        down()
    }
}

/// In-memory store whose message writes land after a delay
///
/// Widens the gap between the duplicate check and the write so that
/// overlapping deliveries of one message both reach classification.
#[derive(Debug)]
pub struct DelayedStore {
    inner: InMemoryMetricsStore,
    delay: Duration,
}

impl DelayedStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryMetricsStore::new(),
            delay,
        })
    }
}

#[async_trait]
impl MetricsStore for DelayedStore {
    async fn project(&self, project: &ProjectId) -> StoreResult<Project> {
        self.inner.project(project).await
    }

    async fn snapshot(&self, project: &ProjectId) -> StoreResult<MetricsSnapshot> {
        self.inner.snapshot(project).await
    }

    async fn has_seen_message(
        &self,
        community: &CommunityId,
        message: &MessageId,
    ) -> StoreResult<bool> {
        self.inner.has_seen_message(community, message).await
    }

    async fn apply_message(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        message: &MessageId,
        kind: ActivityKind,
        quality_delta: f64,
    ) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .apply_message(project, community, message, kind, quality_delta)
            .await
    }

    async fn set_member_count(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord> {
        self.inner
            .set_member_count(project, community, member_count)
            .await
    }

    async fn confirm_automation(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord> {
        self.inner
            .confirm_automation(project, community, member_count)
            .await
    }

    async fn append_artifact(&self, project: &ProjectId, kind: ArtifactKind) -> StoreResult<()> {
        self.inner.append_artifact(project, kind).await
    }

    async fn connect_social(&self, project: &ProjectId, handle: &str) -> StoreResult<SocialRecord> {
        self.inner.connect_social(project, handle).await
    }

    async fn record_intro_post(&self, project: &ProjectId, post_id: &str) -> StoreResult<bool> {
        self.inner.record_intro_post(project, post_id).await
    }

    async fn set_link_once(
        &self,
        project: &ProjectId,
        kind: LinkKind,
        url: &str,
    ) -> StoreResult<bool> {
        self.inner.set_link_once(project, kind, url).await
    }

    async fn record_verified_member(
        &self,
        project: &ProjectId,
        member: &MemberId,
    ) -> StoreResult<bool> {
        self.inner.record_verified_member(project, member).await
    }

    async fn compare_and_set_level(
        &self,
        project: &ProjectId,
        expected: Level,
        next: Level,
    ) -> StoreResult<Option<LevelChanged>> {
        self.inner
            .compare_and_set_level(project, expected, next)
            .await
    }

    async fn mark_completed(&self, project: &ProjectId) -> StoreResult<bool> {
        self.inner.mark_completed(project).await
    }

    async fn transitions(&self, project: &ProjectId) -> StoreResult<Vec<LevelChanged>> {
        self.inner.transitions(project).await
    }

    async fn projects(&self) -> StoreResult<Vec<ProjectId>> {
        self.inner.projects().await
    }
}

/// Normalizer over a fresh in-memory store
pub fn setup(
    config: &EngineConfig,
    notifier: Arc<dyn Notifier>,
) -> (Arc<InMemoryMetricsStore>, Arc<EventNormalizer>) {
    let store = Arc::new(InMemoryMetricsStore::new());
    let normalizer = EventNormalizer::from_config(config, Arc::clone(&store) as _, notifier);
    (store, Arc::new(normalizer))
}

pub fn level(n: u8) -> Level {
    Level::new(n).unwrap()
}

/// Write levels directly up to `target`, bypassing the gates
pub async fn seed_level(store: &InMemoryMetricsStore, project: &str, target: u8) {
    let project = ProjectId::from(project);
    for n in 1..target {
        store
            .compare_and_set_level(&project, level(n), level(n + 1))
            .await
            .unwrap();
    }
}

pub fn message(project: &str, id: &str, author: &str, text: &str) -> InboundEvent {
    InboundEvent::MessageArrived {
        project_id: project.into(),
        community_id: COMMUNITY.into(),
        author_id: author.into(),
        message_id: id.into(),
        text: text.to_string(),
        attachments: Vec::new(),
    }
}

/// Ordinary message that clears the low-value filter
pub fn chat(project: &str, n: usize) -> InboundEvent {
    message(
        project,
        &format!("chat-{n}"),
        &format!("member-{}", n % 7),
        &format!("Plate {n} looks healthy after the overnight incubation run"),
    )
}

/// Message recognised as scientific content
pub fn paper(project: &str, n: usize) -> InboundEvent {
    message(
        project,
        &format!("paper-{n}"),
        "member-0",
        &format!("Relevant preprint for our assay https://arxiv.org/abs/2504.{n:05}"),
    )
}

pub fn member_joined(project: &str, count: u32) -> InboundEvent {
    InboundEvent::MemberJoined {
        project_id: project.into(),
        community_id: COMMUNITY.into(),
        new_member_count: count,
    }
}

pub fn automation(project: &str, members: u32) -> InboundEvent {
    InboundEvent::AutomationConfirmed {
        project_id: project.into(),
        community_id: COMMUNITY.into(),
        member_count: members,
    }
}

pub fn artifact(project: &str, kind: ArtifactKind) -> InboundEvent {
    InboundEvent::ArtifactMinted {
        project_id: project.into(),
        artifact_type: kind,
    }
}

pub fn social_connected(project: &str) -> InboundEvent {
    InboundEvent::SocialAccountConnected {
        project_id: project.into(),
        handle: format!("@{HANDLE}"),
    }
}

pub fn intro_posts(project: &str, ids: &[u64]) -> InboundEvent {
    InboundEvent::SocialPostsSubmitted {
        project_id: project.into(),
        urls: ids
            .iter()
            .map(|id| format!("https://x.com/{HANDLE}/status/{id}"))
            .collect(),
    }
}

pub fn link(project: &str, kind: LinkKind) -> InboundEvent {
    InboundEvent::LinkVerified {
        project_id: project.into(),
        kind,
        url: format!("https://media.example.org/{project}/{kind}"),
    }
}

pub fn profile(project: &str, member: &str) -> InboundEvent {
    InboundEvent::ScientificProfileVerified {
        project_id: project.into(),
        member_id: member.into(),
    }
}

/// Events taking a fresh project to level 3 with 5 members linked
pub fn through_level_two(project: &str) -> Vec<InboundEvent> {
    vec![
        artifact(project, ArtifactKind::Idea),
        artifact(project, ArtifactKind::Vision),
        automation(project, 5),
    ]
}

/// Activity satisfying the level 3 gate at the default thresholds
pub fn level_three_activity(project: &str) -> Vec<InboundEvent> {
    (0..5)
        .map(|n| paper(project, n))
        .chain((0..50).map(|n| chat(project, n)))
        .collect()
}

/// Full event history from a fresh project to completion
pub fn full_journey(project: &str) -> Vec<InboundEvent> {
    let mut events = through_level_two(project);
    events.extend(level_three_activity(project));
    events.push(social_connected(project));
    events.push(intro_posts(project, &[101, 102, 103]));
    events.extend((0..10).map(|n| profile(project, &format!("scientist-{n}"))));
    events.push(link(project, LinkKind::Space));
    events.push(link(project, LinkKind::Blogpost));
    events.push(link(project, LinkKind::Thread));
    events.push(link(project, LinkKind::Video));
    events
}
