//! Metrics store contract and the concurrent in-memory implementation
//!
//! Every mutation is a single atomic operation against one project's
//! records: counters are incremented in place, write-once fields are
//! compare-and-set, and the level only moves through
//! [`MetricsStore::compare_and_set_level`]. No operation takes a lock that
//! spans more than one project.

use crate::error::{StoreError, StoreResult};
use crate::types::{
    ActivityKind, ArtifactKind, ArtifactRecord, CommunityId, CommunityRecord, Level, LevelChanged,
    LinkKind, MemberId, MessageId, MetricsSnapshot, Project, ProjectId, SocialRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::HashSet;

/// Weight kept from the previous quality score on each counted message
pub const QUALITY_RETAIN: f64 = 0.9;

/// Durable per-project records consumed by the progression core
///
/// Implementations must make each method atomic with respect to concurrent
/// callers on the same project. Reads of an unknown project create it at
/// [`Level::FIRST`].
#[async_trait]
pub trait MetricsStore: Send + Sync + std::fmt::Debug {
    /// Load the project row, creating it on first contact
    async fn project(&self, project: &ProjectId) -> StoreResult<Project>;

    /// Load everything the gates read
    async fn snapshot(&self, project: &ProjectId) -> StoreResult<MetricsSnapshot>;

    /// Check whether a message id was already counted in its community
    async fn has_seen_message(
        &self,
        community: &CommunityId,
        message: &MessageId,
    ) -> StoreResult<bool>;

    /// Record a classified message exactly once
    ///
    /// Returns `false` when `message` was already recorded for `community`,
    /// in which case no counter moves.
    async fn apply_message(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        message: &MessageId,
        kind: ActivityKind,
        quality_delta: f64,
    ) -> StoreResult<bool>;

    /// Set the platform-reported member count
    async fn set_member_count(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord>;

    /// Mark automation installed and the link verified, refreshing members
    async fn confirm_automation(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord>;

    /// Append an artifact record
    async fn append_artifact(&self, project: &ProjectId, kind: ArtifactKind) -> StoreResult<()>;

    /// Connect a social account
    async fn connect_social(&self, project: &ProjectId, handle: &str) -> StoreResult<SocialRecord>;

    /// Count a verified introduction post once per post id
    async fn record_intro_post(&self, project: &ProjectId, post_id: &str) -> StoreResult<bool>;

    /// Set a write-once link; returns `false` if it was already set
    async fn set_link_once(
        &self,
        project: &ProjectId,
        kind: LinkKind,
        url: &str,
    ) -> StoreResult<bool>;

    /// Count a verified scientific profile once per member
    async fn record_verified_member(
        &self,
        project: &ProjectId,
        member: &MemberId,
    ) -> StoreResult<bool>;

    /// Write `to` only if the current level equals `expected`
    ///
    /// On success the transition is appended to the project's history and
    /// returned. `Ok(None)` means another writer moved the level first.
    ///
    /// # Errors
    /// [`StoreError::NonMonotonic`] if `to <= expected`
    async fn compare_and_set_level(
        &self,
        project: &ProjectId,
        expected: Level,
        to: Level,
    ) -> StoreResult<Option<LevelChanged>>;

    /// Set the completion marker; returns `false` if already set
    async fn mark_completed(&self, project: &ProjectId) -> StoreResult<bool>;

    /// Applied transitions, oldest first
    async fn transitions(&self, project: &ProjectId) -> StoreResult<Vec<LevelChanged>>;

    /// Known projects
    async fn projects(&self) -> StoreResult<Vec<ProjectId>>;
}

#[derive(Debug)]
struct ProjectEntry {
    project: Project,
    community: Option<CommunityRecord>,
    social: Option<SocialRecord>,
    artifacts: Vec<ArtifactRecord>,
    history: Vec<LevelChanged>,
    intro_posts: HashSet<String>,
    verified_members: HashSet<MemberId>,
}

impl ProjectEntry {
    fn new(id: ProjectId) -> Self {
        Self {
            project: Project::new(id),
            community: None,
            social: None,
            artifacts: Vec::new(),
            history: Vec::new(),
            intro_posts: HashSet::new(),
            verified_members: HashSet::new(),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            project: self.project.clone(),
            community: self.community.clone(),
            social: self.social.clone(),
            artifacts: self.artifacts.clone(),
        }
    }

    /// Community record bound to `community`, created on first link
    fn community_mut(&mut self, community: &CommunityId) -> StoreResult<&mut CommunityRecord> {
        let project = self.project.id.clone();
        let record = self
            .community
            .get_or_insert_with(|| CommunityRecord::new(community.clone()));

        if record.community_id != *community {
            return Err(StoreError::CommunityMismatch {
                project,
                bound: record.community_id.clone(),
                requested: community.clone(),
            });
        }

        Ok(record)
    }

    fn social_mut(&mut self) -> &mut SocialRecord {
        self.social.get_or_insert_with(SocialRecord::default)
    }
}

/// Concurrent in-memory store
///
/// Each project lives in one [`DashMap`] entry, so every operation holds the
/// shard lock for that project only. Seen message ids are kept per community
/// for the life of the store.
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    projects: DashMap<ProjectId, ProjectEntry>,
    seen_messages: DashMap<CommunityId, HashSet<MessageId>>,
}

impl InMemoryMetricsStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known projects
    #[inline]
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    fn entry(&self, project: &ProjectId) -> RefMut<'_, ProjectId, ProjectEntry> {
        self.projects
            .entry(project.clone())
            .or_insert_with(|| ProjectEntry::new(project.clone()))
    }
}

fn blend_quality(old: f64, delta: f64) -> f64 {
    (QUALITY_RETAIN * old + (1.0 - QUALITY_RETAIN) * delta).clamp(0.0, 100.0)
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn project(&self, project: &ProjectId) -> StoreResult<Project> {
        Ok(self.entry(project).project.clone())
    }

    async fn snapshot(&self, project: &ProjectId) -> StoreResult<MetricsSnapshot> {
        Ok(self.entry(project).snapshot())
    }

    async fn has_seen_message(
        &self,
        community: &CommunityId,
        message: &MessageId,
    ) -> StoreResult<bool> {
        Ok(self
            .seen_messages
            .get(community)
            .is_some_and(|seen| seen.contains(message)))
    }

    async fn apply_message(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        message: &MessageId,
        kind: ActivityKind,
        quality_delta: f64,
    ) -> StoreResult<bool> {
        let mut entry = self.entry(project);
        let record = entry.community_mut(community)?;

        let fresh = self
            .seen_messages
            .entry(community.clone())
            .or_default()
            .insert(message.clone());
        if !fresh {
            tracing::debug!(%project, %community, %message, "duplicate message dropped");
            return Ok(false);
        }

        match kind {
            ActivityKind::Paper => record.papers_shared += 1,
            ActivityKind::Message => {
                record.messages_count += 1;
                record.quality_score = blend_quality(record.quality_score, quality_delta);
            }
            ActivityKind::Ignored => {}
        }

        Ok(true)
    }

    async fn set_member_count(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord> {
        let mut entry = self.entry(project);
        let record = entry.community_mut(community)?;
        record.member_count = member_count;
        Ok(record.clone())
    }

    async fn confirm_automation(
        &self,
        project: &ProjectId,
        community: &CommunityId,
        member_count: u32,
    ) -> StoreResult<CommunityRecord> {
        let mut entry = self.entry(project);
        let record = entry.community_mut(community)?;
        record.bot_confirmed = true;
        record.link_verified = true;
        record.member_count = member_count;
        Ok(record.clone())
    }

    async fn append_artifact(&self, project: &ProjectId, kind: ArtifactKind) -> StoreResult<()> {
        self.entry(project).artifacts.push(ArtifactRecord {
            project_id: project.clone(),
            kind,
        });
        Ok(())
    }

    async fn connect_social(&self, project: &ProjectId, handle: &str) -> StoreResult<SocialRecord> {
        let mut entry = self.entry(project);
        let social = entry.social_mut();
        social.connected = true;
        social.handle = Some(handle.to_string());
        Ok(social.clone())
    }

    async fn record_intro_post(&self, project: &ProjectId, post_id: &str) -> StoreResult<bool> {
        let mut entry = self.entry(project);
        if !entry.intro_posts.insert(post_id.to_string()) {
            return Ok(false);
        }
        let count = u32::try_from(entry.intro_posts.len()).unwrap_or(u32::MAX);
        entry.social_mut().intro_post_count = count;
        Ok(true)
    }

    async fn set_link_once(
        &self,
        project: &ProjectId,
        kind: LinkKind,
        url: &str,
    ) -> StoreResult<bool> {
        let mut entry = self.entry(project);
        let slot = entry.social_mut().link_slot(kind);
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(url.to_string());
        Ok(true)
    }

    async fn record_verified_member(
        &self,
        project: &ProjectId,
        member: &MemberId,
    ) -> StoreResult<bool> {
        let mut entry = self.entry(project);
        if !entry.verified_members.insert(member.clone()) {
            return Ok(false);
        }
        entry.project.verified_member_count =
            u32::try_from(entry.verified_members.len()).unwrap_or(u32::MAX);
        Ok(true)
    }

    async fn compare_and_set_level(
        &self,
        project: &ProjectId,
        expected: Level,
        to: Level,
    ) -> StoreResult<Option<LevelChanged>> {
        if to <= expected {
            return Err(StoreError::NonMonotonic {
                project: project.clone(),
                from: expected,
                to,
            });
        }

        let mut entry = self.entry(project);
        if entry.project.level != expected {
            return Ok(None);
        }

        entry.project.level = to;
        let change = LevelChanged {
            project_id: project.clone(),
            previous_level: expected,
            new_level: to,
            at: Utc::now(),
        };
        entry.history.push(change.clone());
        Ok(Some(change))
    }

    async fn mark_completed(&self, project: &ProjectId) -> StoreResult<bool> {
        let mut entry = self.entry(project);
        if entry.project.completed {
            return Ok(false);
        }
        entry.project.completed = true;
        Ok(true)
    }

    async fn transitions(&self, project: &ProjectId) -> StoreResult<Vec<LevelChanged>> {
        Ok(self.entry(project).history.clone())
    }

    async fn projects(&self) -> StoreResult<Vec<ProjectId>> {
        let mut ids: Vec<ProjectId> = self.projects.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}
