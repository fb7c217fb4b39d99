//! The fixed level table
//!
//! One row per level: the sub-predicates that must all hold to leave it.
//! Numeric thresholds come from [`GateThresholds`]; the shape of the table is
//! not configurable.

use ascent_metrics::{ArtifactKind, Level, LinkKind, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Invalid threshold configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    /// A threshold that must be positive was zero
    #[error("threshold '{0}' must be greater than zero")]
    Zero(&'static str),
}

/// Numeric thresholds of the gate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    /// Members required to leave level 2
    pub linked_members: u32,
    /// Members required to leave level 3
    pub active_members: u32,
    /// Papers required to leave level 3
    pub papers_shared: u64,
    /// Messages required to leave level 3
    pub messages_count: u64,
    /// Verified intro posts required to leave level 4
    pub intro_posts: u32,
    /// Verified scientific profiles required to leave level 5
    pub verified_members: u32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            linked_members: 4,
            active_members: 5,
            papers_shared: 5,
            messages_count: 50,
            intro_posts: 3,
            verified_members: 10,
        }
    }
}

impl GateThresholds {
    /// Check every threshold is positive
    ///
    /// # Errors
    /// [`ThresholdError::Zero`] naming the first zero threshold
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let checks = [
            ("linked_members", u64::from(self.linked_members)),
            ("active_members", u64::from(self.active_members)),
            ("papers_shared", self.papers_shared),
            ("messages_count", self.messages_count),
            ("intro_posts", u64::from(self.intro_posts)),
            ("verified_members", u64::from(self.verified_members)),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ThresholdError::Zero(*name)),
            None => Ok(()),
        }
    }
}

/// What a satisfied gate unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// Advance to this level
    Level(Level),
    /// Journey complete (past the last level)
    Complete,
}

impl Milestone {
    /// Milestone unlocked by the gate of `level`
    #[inline]
    #[must_use]
    pub fn after(level: Level) -> Self {
        level.next().map_or(Milestone::Complete, Milestone::Level)
    }

    /// Notification template announcing this milestone
    #[must_use]
    pub fn template_id(self) -> String {
        match self {
            Milestone::Level(level) => format!("level-{}-reached", level.value()),
            Milestone::Complete => "journey-complete".to_string(),
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Level(level) => write!(f, "level {level}"),
            Milestone::Complete => f.write_str("complete"),
        }
    }
}

/// One sub-predicate of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "requirement", rename_all = "snake_case")]
pub enum Requirement {
    /// An idea artifact exists
    IdeaArtifact,
    /// A vision artifact exists
    VisionArtifact,
    /// Community link verified
    LinkVerified,
    /// Community has at least this many members
    MemberCount {
        /// Threshold
        min: u32,
    },
    /// At least this many papers shared
    PapersShared {
        /// Threshold
        min: u64,
    },
    /// At least this many counted messages
    MessagesCount {
        /// Threshold
        min: u64,
    },
    /// Social account connected
    SocialConnected,
    /// At least this many verified intro posts
    IntroPosts {
        /// Threshold
        min: u32,
    },
    /// At least this many verified scientific profiles
    VerifiedMembers {
        /// Threshold
        min: u32,
    },
    /// Write-once link present
    Link {
        /// Which link
        kind: LinkKind,
    },
}

impl Requirement {
    /// Check the sub-predicate against a snapshot
    #[must_use]
    pub fn is_met(&self, metrics: &MetricsSnapshot) -> bool {
        match *self {
            Requirement::IdeaArtifact => metrics.has_artifact(ArtifactKind::Idea),
            Requirement::VisionArtifact => metrics.has_artifact(ArtifactKind::Vision),
            Requirement::LinkVerified => metrics.link_verified(),
            Requirement::MemberCount { min } => metrics.member_count() >= min,
            Requirement::PapersShared { min } => metrics.papers_shared() >= min,
            Requirement::MessagesCount { min } => metrics.messages_count() >= min,
            Requirement::SocialConnected => metrics.social_connected(),
            Requirement::IntroPosts { min } => metrics.intro_post_count() >= min,
            Requirement::VerifiedMembers { min } => metrics.project.verified_member_count >= min,
            Requirement::Link { kind } => metrics.has_link(kind),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::IdeaArtifact => f.write_str("ideaArtifact"),
            Requirement::VisionArtifact => f.write_str("visionArtifact"),
            Requirement::LinkVerified => f.write_str("linkVerified"),
            Requirement::MemberCount { min } => write!(f, "memberCount>={min}"),
            Requirement::PapersShared { min } => write!(f, "papersShared>={min}"),
            Requirement::MessagesCount { min } => write!(f, "messagesCount>={min}"),
            Requirement::SocialConnected => f.write_str("socialConnected"),
            Requirement::IntroPosts { min } => write!(f, "introPostCount>={min}"),
            Requirement::VerifiedMembers { min } => write!(f, "verifiedMemberCount>={min}"),
            Requirement::Link { kind } => match kind {
                LinkKind::Space => f.write_str("spaceUrl"),
                LinkKind::Blogpost => f.write_str("blogpostUrl"),
                LinkKind::Thread => f.write_str("threadUrl"),
                LinkKind::Video => f.write_str("welcomeVideoUrl"),
            },
        }
    }
}

/// Sub-predicates that must all hold to leave `level`
#[must_use]
pub fn requirements(level: Level, thresholds: &GateThresholds) -> Vec<Requirement> {
    match level.value() {
        1 => vec![Requirement::IdeaArtifact, Requirement::VisionArtifact],
        2 => vec![
            Requirement::LinkVerified,
            Requirement::MemberCount {
                min: thresholds.linked_members,
            },
        ],
        3 => vec![
            Requirement::MemberCount {
                min: thresholds.active_members,
            },
            Requirement::PapersShared {
                min: thresholds.papers_shared,
            },
            Requirement::MessagesCount {
                min: thresholds.messages_count,
            },
        ],
        4 => vec![
            Requirement::SocialConnected,
            Requirement::IntroPosts {
                min: thresholds.intro_posts,
            },
        ],
        5 => vec![
            Requirement::VerifiedMembers {
                min: thresholds.verified_members,
            },
            Requirement::Link {
                kind: LinkKind::Space,
            },
        ],
        6 => vec![
            Requirement::Link {
                kind: LinkKind::Blogpost,
            },
            Requirement::Link {
                kind: LinkKind::Thread,
            },
        ],
        _ => vec![Requirement::Link {
            kind: LinkKind::Video,
        }],
    }
}
