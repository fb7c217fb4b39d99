//! Ascent Gate Evaluator
//!
//! The single, fixed level table and the pure function that evaluates it.
//!
//! | From → To | Predicate |
//! |---|---|
//! | 1 → 2 | idea artifact AND vision artifact |
//! | 2 → 3 | link verified AND members ≥ 4 |
//! | 3 → 4 | members ≥ 5 AND papers ≥ 5 AND messages ≥ 50 |
//! | 4 → 5 | social connected AND intro posts ≥ 3 |
//! | 5 → 6 | verified members ≥ 10 AND space link |
//! | 6 → 7 | blogpost link AND thread link |
//! | 7 → complete | welcome video link |
//!
//! # Example
//!
//! ```rust,ignore
//! use ascent_gate::evaluate;
//!
//! let result = evaluate(snapshot.project.level, &snapshot);
//! if !result.satisfied {
//!     println!("still missing: {:?}", result.missing_labels());
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod evaluator;
pub mod table;

pub use evaluator::{evaluate, GateEvaluation, GateEvaluator};
pub use table::{requirements, GateThresholds, Milestone, Requirement, ThresholdError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
