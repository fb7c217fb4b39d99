//! Inbound events and their normalized form
//!
//! Events arrive as `{"kind": "...", ...}` JSON objects from independent,
//! at-least-once sources. [`InboundEvent::validate`] is the boundary: it
//! rejects blank identifiers and bad URLs and produces a closed
//! [`MetricUpdate`] against a single project.

use crate::error::NormalizeError;
use ascent_classifier::Attachment;
use ascent_metrics::{ArtifactKind, AuthorId, CommunityId, LinkKind, MemberId, MessageId, ProjectId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HTTP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9.-]+(:\d+)?(/\S*)?$").expect("valid http url pattern")
});

static STATUS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.|mobile\.)?(?:twitter\.com|x\.com)/@?([A-Za-z0-9_]{1,15})/status(?:es)?/(\d+)(?:[/?#]\S*)?$",
    )
    .expect("valid status url pattern")
});

/// Event as delivered by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    /// Chat message posted in the linked community
    MessageArrived {
        /// Owning project
        project_id: ProjectId,
        /// Community the message was posted in
        community_id: CommunityId,
        /// Author
        author_id: AuthorId,
        /// Message id, unique within the community
        message_id: MessageId,
        /// Body
        text: String,
        /// Attached files
        #[serde(default)]
        attachments: Vec<Attachment>,
    },
    /// Platform reported a new member count
    MemberJoined {
        /// Owning project
        project_id: ProjectId,
        /// Community
        community_id: CommunityId,
        /// Member count after the join
        new_member_count: u32,
    },
    /// Automation installed and confirmed in the community
    AutomationConfirmed {
        /// Owning project
        project_id: ProjectId,
        /// Community
        community_id: CommunityId,
        /// Current member count
        member_count: u32,
    },
    /// Credential minted for the project
    ArtifactMinted {
        /// Owning project
        project_id: ProjectId,
        /// Credential kind
        artifact_type: ArtifactKind,
    },
    /// Owner connected a social account
    SocialAccountConnected {
        /// Owning project
        project_id: ProjectId,
        /// Account handle, with or without a leading `@`
        handle: String,
    },
    /// Owner submitted introduction posts for verification
    SocialPostsSubmitted {
        /// Owning project
        project_id: ProjectId,
        /// Post URLs
        urls: Vec<String>,
    },
    /// A write-once link was verified
    LinkVerified {
        /// Owning project
        project_id: ProjectId,
        /// Which link; `linkKind` on the wire, `kind` being the event tag
        #[serde(rename = "linkKind")]
        kind: LinkKind,
        /// Verified URL
        url: String,
    },
    /// A community member's scientific profile was verified
    ScientificProfileVerified {
        /// Owning project
        project_id: ProjectId,
        /// Verified member
        member_id: MemberId,
    },
}

/// Validated update against one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricUpdate {
    /// Classify and count a message
    Message {
        /// Community the message belongs to
        community_id: CommunityId,
        /// Dedup key within the community
        message_id: MessageId,
        /// Author
        author_id: AuthorId,
        /// Body
        text: String,
        /// Attached files
        attachments: Vec<Attachment>,
    },
    /// Set the member count gauge
    MemberCount {
        /// Community
        community_id: CommunityId,
        /// New count
        member_count: u32,
    },
    /// Confirm automation and verify the community link
    Automation {
        /// Community
        community_id: CommunityId,
        /// Refreshed count
        member_count: u32,
    },
    /// Append an artifact
    Artifact(ArtifactKind),
    /// Connect a social account; handle is normalized
    SocialConnected(String),
    /// Verify and count introduction posts
    IntroPosts(Vec<String>),
    /// Set a write-once link
    Link {
        /// Which link
        kind: LinkKind,
        /// URL
        url: String,
    },
    /// Count a verified scientific profile
    VerifiedMember(MemberId),
}

impl InboundEvent {
    /// Decode one JSON event
    ///
    /// # Errors
    /// [`NormalizeError::Malformed`] on any decoding failure
    pub fn from_json(payload: &str) -> Result<Self, NormalizeError> {
        serde_json::from_str(payload).map_err(|e| NormalizeError::Malformed(e.to_string()))
    }

    /// Wire name of the event kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageArrived { .. } => "message_arrived",
            Self::MemberJoined { .. } => "member_joined",
            Self::AutomationConfirmed { .. } => "automation_confirmed",
            Self::ArtifactMinted { .. } => "artifact_minted",
            Self::SocialAccountConnected { .. } => "social_account_connected",
            Self::SocialPostsSubmitted { .. } => "social_posts_submitted",
            Self::LinkVerified { .. } => "link_verified",
            Self::ScientificProfileVerified { .. } => "scientific_profile_verified",
        }
    }

    /// Project the event targets
    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        match self {
            Self::MessageArrived { project_id, .. }
            | Self::MemberJoined { project_id, .. }
            | Self::AutomationConfirmed { project_id, .. }
            | Self::ArtifactMinted { project_id, .. }
            | Self::SocialAccountConnected { project_id, .. }
            | Self::SocialPostsSubmitted { project_id, .. }
            | Self::LinkVerified { project_id, .. }
            | Self::ScientificProfileVerified { project_id, .. } => project_id,
        }
    }

    /// Check required fields and convert to a [`MetricUpdate`]
    ///
    /// # Errors
    /// [`NormalizeError`] naming the first invalid field
    pub fn validate(self) -> Result<(ProjectId, MetricUpdate), NormalizeError> {
        let kind = self.kind();
        if self.project_id().is_blank() {
            return Err(NormalizeError::missing(kind, "projectId"));
        }

        let update = match self {
            Self::MessageArrived {
                project_id,
                community_id,
                author_id,
                message_id,
                text,
                attachments,
            } => {
                require(kind, "communityId", !community_id.is_blank())?;
                require(kind, "authorId", !author_id.is_blank())?;
                require(kind, "messageId", !message_id.is_blank())?;
                (
                    project_id,
                    MetricUpdate::Message {
                        community_id,
                        message_id,
                        author_id,
                        text,
                        attachments,
                    },
                )
            }
            Self::MemberJoined {
                project_id,
                community_id,
                new_member_count,
            } => {
                require(kind, "communityId", !community_id.is_blank())?;
                (
                    project_id,
                    MetricUpdate::MemberCount {
                        community_id,
                        member_count: new_member_count,
                    },
                )
            }
            Self::AutomationConfirmed {
                project_id,
                community_id,
                member_count,
            } => {
                require(kind, "communityId", !community_id.is_blank())?;
                (
                    project_id,
                    MetricUpdate::Automation {
                        community_id,
                        member_count,
                    },
                )
            }
            Self::ArtifactMinted {
                project_id,
                artifact_type,
            } => (project_id, MetricUpdate::Artifact(artifact_type)),
            Self::SocialAccountConnected { project_id, handle } => {
                let handle = normalize_handle(&handle);
                require(kind, "handle", !handle.is_empty())?;
                (project_id, MetricUpdate::SocialConnected(handle))
            }
            Self::SocialPostsSubmitted { project_id, urls } => {
                require(kind, "urls", urls.iter().any(|u| !u.trim().is_empty()))?;
                (project_id, MetricUpdate::IntroPosts(urls))
            }
            Self::LinkVerified {
                project_id,
                kind: link,
                url,
            } => {
                let url = url.trim().to_string();
                require(kind, "url", !url.is_empty())?;
                if !is_http_url(&url) {
                    return Err(NormalizeError::InvalidUrl { kind, url });
                }
                (project_id, MetricUpdate::Link { kind: link, url })
            }
            Self::ScientificProfileVerified {
                project_id,
                member_id,
            } => {
                require(kind, "memberId", !member_id.is_blank())?;
                (project_id, MetricUpdate::VerifiedMember(member_id))
            }
        };
        Ok(update)
    }
}

fn require(kind: &'static str, field: &'static str, present: bool) -> Result<(), NormalizeError> {
    if present {
        Ok(())
    } else {
        Err(NormalizeError::missing(kind, field))
    }
}

/// Check for an absolute http(s) URL
#[must_use]
pub fn is_http_url(url: &str) -> bool {
    HTTP_URL.is_match(url)
}

/// Strip whitespace and a leading `@`, lowercase
#[must_use]
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Parsed social status URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUrl {
    /// Author handle as written in the URL
    pub handle: String,
    /// Numeric status id
    pub status_id: String,
}

impl StatusUrl {
    /// Check the post was made by `handle`
    #[must_use]
    pub fn is_by(&self, handle: &str) -> bool {
        normalize_handle(&self.handle) == normalize_handle(handle)
    }
}

/// Parse a twitter.com / x.com status URL
#[must_use]
pub fn parse_status_url(url: &str) -> Option<StatusUrl> {
    let caps = STATUS_URL.captures(url.trim())?;
    Some(StatusUrl {
        handle: caps[1].to_string(),
        status_id: caps[2].to_string(),
    })
}
