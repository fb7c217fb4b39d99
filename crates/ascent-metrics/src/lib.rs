//! Ascent Metrics
//!
//! Durable per-project counters and verification flags read by the gate
//! evaluator and written by the event normalizer.
//!
//! # Records
//!
//! - [`Project`]: level, completion marker, verified member count
//! - [`CommunityRecord`]: member count, message and paper counters, quality score
//! - [`SocialRecord`]: account connection, intro posts, write-once links
//! - [`ArtifactRecord`]: append-only minted credentials
//!
//! # Concurrency
//!
//! Writers from independent event paths never overwrite a counter blindly:
//! [`MetricsStore`] methods are atomic increments, insert-if-absent or
//! compare-and-set operations scoped to one project.
//!
//! ```rust,ignore
//! use ascent_metrics::{InMemoryMetricsStore, Level, MetricsStore, ProjectId};
//!
//! let store = InMemoryMetricsStore::new();
//! let project = ProjectId::from("p1");
//! let advanced = store
//!     .compare_and_set_level(&project, Level::FIRST, Level::new(2)?)
//!     .await?;
//! assert!(advanced.is_some());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod store;
pub mod types;

pub use error::{LevelError, StoreError, StoreResult};
pub use store::{InMemoryMetricsStore, MetricsStore, QUALITY_RETAIN};
pub use types::{
    ActivityKind, ArtifactKind, ArtifactRecord, AuthorId, CommunityId, CommunityRecord, Level,
    LevelChanged, LinkKind, MemberId, MessageId, MetricsSnapshot, Project, ProjectId,
    SocialRecord,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
