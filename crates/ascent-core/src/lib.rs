//! Ascent Core - level progression for projects
//!
//! Funnels every inbound source through one pipeline that owns transition
//! side effects:
//!
//! ```text
//! event → EventNormalizer → MetricsStore update → ProgressionEngine
//!                                                   ├─ gate evaluation
//!                                                   ├─ level compare-and-set
//!                                                   └─ IdempotencyGuard → NotificationDispatch
//! ```
//!
//! The compare-and-set on the level is the sole correctness guarantee; the
//! guard only keeps racing writers from sending the same notification twice.
//!
//! # Example
//!
//! ```rust,ignore
//! use ascent_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), AscentError> {
//! let store = Arc::new(InMemoryMetricsStore::new());
//! let normalizer =
//!     EventNormalizer::from_config(&EngineConfig::default(), store, Arc::new(TracingNotifier));
//!
//! let report = normalizer
//!     .ingest_json(r#"{"kind":"artifact_minted","projectId":"p1","artifactType":"idea"}"#)
//!     .await?;
//! println!("{} transitions", report.progress.changes.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod normalizer;

pub use config::{EngineConfig, GuardConfig, MIN_STEPS_PER_PASS};
pub use dispatch::{
    DispatchReport, NotificationDispatch, NotificationRequested, Notifier, TracingNotifier,
};
pub use engine::{Progress, ProgressionEngine, ProjectStatus, StepOutcome};
pub use error::{AscentError, AscentResult, ConfigError, DispatchError, NormalizeError};
pub use events::{parse_status_url, InboundEvent, MetricUpdate, StatusUrl};
pub use guard::IdempotencyGuard;
pub use normalizer::{Applied, EventNormalizer, IngestReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring the progression pipeline
    pub use crate::{
        AscentError, EngineConfig, EventNormalizer, InboundEvent, Notifier, ProgressionEngine,
        TracingNotifier,
    };
    pub use ascent_metrics::{InMemoryMetricsStore, Level, MetricsStore, ProjectId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
