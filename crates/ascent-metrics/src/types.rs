//! Core records held by the metrics store
//!
//! Defines:
//! - Identifiers for projects, communities, messages and members
//! - The [`Level`] scale and the persisted project row
//! - Community, social and artifact records
//! - [`MetricsSnapshot`], the read model handed to gate evaluation

use crate::error::LevelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check for an empty or whitespace-only identifier
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Project identifier (assigned by the owning platform)
    ProjectId
);
string_id!(
    /// Community (chat server) identifier
    CommunityId
);
string_id!(
    /// Author of a community message
    AuthorId
);
string_id!(
    /// Message identifier, unique within its community
    MessageId
);
string_id!(
    /// Community member identifier
    MemberId
);

/// Maturity level in `[1, 7]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    /// Entry level of every new project
    pub const FIRST: Level = Level(1);
    /// Highest level; its gate leads to completion
    pub const LAST: Level = Level(7);

    /// Create level from raw value
    ///
    /// # Errors
    /// Returns [`LevelError`] when `value` is outside `[1, 7]`
    #[inline]
    pub fn new(value: u8) -> Result<Self, LevelError> {
        if (Self::FIRST.0..=Self::LAST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LevelError(value))
        }
    }

    /// Get numeric value
    #[inline]
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Following level, `None` at [`Level::LAST`]
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Level> {
        (self.0 < Self::LAST.0).then(|| Level(self.0 + 1))
    }

    /// All levels in order
    pub fn all() -> impl Iterator<Item = Level> {
        (Self::FIRST.0..=Self::LAST.0).map(Level)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::FIRST
    }
}

impl TryFrom<u8> for Level {
    type Error = LevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted project row
///
/// `level` only ever increases and is written exclusively through
/// [`MetricsStore::compare_and_set_level`](crate::MetricsStore::compare_and_set_level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identity
    pub id: ProjectId,
    /// Current level
    pub level: Level,
    /// Set once the last level's gate has been satisfied
    pub completed: bool,
    /// Distinct members with a verified scientific profile
    pub verified_member_count: u32,
}

impl Project {
    /// Create project at the first level
    #[inline]
    #[must_use]
    pub fn new(id: ProjectId) -> Self {
        Self {
            id,
            level: Level::FIRST,
            completed: false,
            verified_member_count: 0,
        }
    }
}

/// Aggregated chat-activity metrics for the project's linked community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    /// Community the record is bound to
    pub community_id: CommunityId,
    /// Member count last reported by the platform
    pub member_count: u32,
    /// Counted ordinary messages
    pub messages_count: u64,
    /// Counted scientific-content messages
    pub papers_shared: u64,
    /// Moving average of message quality in `[0, 100]`
    pub quality_score: f64,
    /// Automation installed and confirmed in the community
    pub bot_confirmed: bool,
    /// Community link verified
    pub link_verified: bool,
}

impl CommunityRecord {
    /// Create empty record bound to a community
    #[must_use]
    pub fn new(community_id: CommunityId) -> Self {
        Self {
            community_id,
            member_count: 0,
            messages_count: 0,
            papers_shared: 0,
            quality_score: 0.0,
            bot_confirmed: false,
            link_verified: false,
        }
    }
}

/// Aggregated social-platform verification state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialRecord {
    /// Connected account handle, without a leading `@`
    pub handle: Option<String>,
    /// Account connected
    pub connected: bool,
    /// Distinct verified introduction posts
    pub intro_post_count: u32,
    /// Verified space recording link
    pub space_url: Option<String>,
    /// Verified blog post link
    pub blogpost_url: Option<String>,
    /// Verified thread link
    pub thread_url: Option<String>,
    /// Verified welcome video link
    pub welcome_video_url: Option<String>,
}

impl SocialRecord {
    /// Current value of a write-once link field
    #[must_use]
    pub fn link(&self, kind: LinkKind) -> Option<&str> {
        match kind {
            LinkKind::Space => self.space_url.as_deref(),
            LinkKind::Blogpost => self.blogpost_url.as_deref(),
            LinkKind::Thread => self.thread_url.as_deref(),
            LinkKind::Video => self.welcome_video_url.as_deref(),
        }
    }

    pub(crate) fn link_slot(&mut self, kind: LinkKind) -> &mut Option<String> {
        match kind {
            LinkKind::Space => &mut self.space_url,
            LinkKind::Blogpost => &mut self.blogpost_url,
            LinkKind::Thread => &mut self.thread_url,
            LinkKind::Video => &mut self.welcome_video_url,
        }
    }
}

/// Write-once link fields on the social record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Live audio space recording
    Space,
    /// Long-form blog post
    Blogpost,
    /// Social thread
    Thread,
    /// Welcome video
    Video,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkKind::Space => "space",
            LinkKind::Blogpost => "blogpost",
            LinkKind::Thread => "thread",
            LinkKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// Minted credential kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Idea credential
    Idea,
    /// Vision credential
    Vision,
}

/// Append-only artifact entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Owning project
    pub project_id: ProjectId,
    /// Artifact kind
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

/// How a community message contributes to the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Scientific content; increments `papers_shared`
    Paper,
    /// Ordinary message; increments `messages_count` and feeds quality
    Message,
    /// Low-value message; excluded from all counters
    Ignored,
}

/// Level transition as persisted and forwarded to live sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChanged {
    /// Project that advanced
    pub project_id: ProjectId,
    /// Level before the write
    pub previous_level: Level,
    /// Level after the write
    pub new_level: Level,
    /// When the write was applied
    pub at: DateTime<Utc>,
}

/// Point-in-time view of everything the gates read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Project row
    pub project: Project,
    /// Community record, if a community has been linked
    pub community: Option<CommunityRecord>,
    /// Social record, if an account has been connected
    pub social: Option<SocialRecord>,
    /// Minted artifacts
    pub artifacts: Vec<ArtifactRecord>,
}

impl MetricsSnapshot {
    /// Empty snapshot for a fresh project
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self {
            project,
            community: None,
            social: None,
            artifacts: Vec::new(),
        }
    }

    /// Check whether an artifact of `kind` exists
    #[must_use]
    pub fn has_artifact(&self, kind: ArtifactKind) -> bool {
        self.artifacts.iter().any(|a| a.kind == kind)
    }

    /// Community member count, zero when unlinked
    #[inline]
    #[must_use]
    pub fn member_count(&self) -> u32 {
        self.community.as_ref().map_or(0, |c| c.member_count)
    }

    /// Counted ordinary messages
    #[inline]
    #[must_use]
    pub fn messages_count(&self) -> u64 {
        self.community.as_ref().map_or(0, |c| c.messages_count)
    }

    /// Counted scientific-content messages
    #[inline]
    #[must_use]
    pub fn papers_shared(&self) -> u64 {
        self.community.as_ref().map_or(0, |c| c.papers_shared)
    }

    /// Community link verified
    #[inline]
    #[must_use]
    pub fn link_verified(&self) -> bool {
        self.community.as_ref().is_some_and(|c| c.link_verified)
    }

    /// Social account connected
    #[inline]
    #[must_use]
    pub fn social_connected(&self) -> bool {
        self.social.as_ref().is_some_and(|s| s.connected)
    }

    /// Verified introduction posts
    #[inline]
    #[must_use]
    pub fn intro_post_count(&self) -> u32 {
        self.social.as_ref().map_or(0, |s| s.intro_post_count)
    }

    /// Check whether a write-once link is set
    #[must_use]
    pub fn has_link(&self, kind: LinkKind) -> bool {
        self.social.as_ref().and_then(|s| s.link(kind)).is_some()
    }
}
