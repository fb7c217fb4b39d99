//! Pure gate evaluation
//!
//! `satisfied` is decided by the boolean AND of the gate's sub-predicates.
//! `missing` is derived separately and is for user guidance only.

use crate::table::{requirements, GateThresholds, Milestone, Requirement};
use ascent_metrics::{Level, MetricsSnapshot};
use serde::{Deserialize, Serialize};

/// Result of evaluating the single gate leaving a level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvaluation {
    /// Level the gate leaves
    pub from: Level,
    /// What the gate unlocks
    pub target: Milestone,
    /// All sub-predicates hold
    pub satisfied: bool,
    /// Unmet sub-predicates, in table order
    pub missing: Vec<Requirement>,
}

impl GateEvaluation {
    /// Human-readable labels of the unmet sub-predicates
    #[must_use]
    pub fn missing_labels(&self) -> Vec<String> {
        self.missing.iter().map(ToString::to_string).collect()
    }
}

/// Gate evaluator over a fixed threshold set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateEvaluator {
    thresholds: GateThresholds,
}

impl GateEvaluator {
    /// Create evaluator with custom thresholds
    #[inline]
    #[must_use]
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    /// Get thresholds
    #[inline]
    #[must_use]
    pub fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    /// Evaluate the gate leaving `level`
    #[must_use]
    pub fn evaluate(&self, level: Level, metrics: &MetricsSnapshot) -> GateEvaluation {
        let gate = requirements(level, &self.thresholds);
        let satisfied = gate.iter().all(|r| r.is_met(metrics));
        let missing = gate.into_iter().filter(|r| !r.is_met(metrics)).collect();

        GateEvaluation {
            from: level,
            target: Milestone::after(level),
            satisfied,
            missing,
        }
    }
}

/// Evaluate the gate leaving `level` with the default thresholds
#[inline]
#[must_use]
pub fn evaluate(level: Level, metrics: &MetricsSnapshot) -> GateEvaluation {
    GateEvaluator::default().evaluate(level, metrics)
}
