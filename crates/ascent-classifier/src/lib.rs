//! Ascent Activity Classifier
//!
//! Classifies inbound community messages as scientific content, ordinary
//! messages or low-value noise, and scores ordinary messages for quality.
//!
//! # Pipeline
//!
//! ```text
//! message → paper detection → low-value filter → quality scoring
//!             (attachment,       (greeting,         (length, near-duplicate,
//!              document link,     emoji-only,        per-minute throttle)
//!              domain/DOI/kw)     short, sparse)
//! ```
//!
//! The classifier is side-effect free with respect to the metrics store: the
//! caller applies the returned [`Classification`].

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod classifier;
pub mod config;
pub mod patterns;
pub mod quality;

pub use classifier::{ActivityClassifier, Classification, CommunityMessage};
pub use config::{ClassifierConfig, ClassifierConfigError};
pub use patterns::{detect_paper, low_value_reason, Attachment, IgnoreReason, PaperSignal};
pub use quality::{base_score, similarity, AuthorHistory, Penalties};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
