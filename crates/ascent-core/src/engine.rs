//! Progression engine
//!
//! The level state machine. One evaluation step loads the project's
//! snapshot, evaluates the single gate leaving its current level, and on
//! success writes `level + 1` through the store's compare-and-set. Only the
//! writer that wins the compare-and-set consults the idempotency guard and
//! dispatches notifications.
//!
//! # Workflow
//! 1. Load snapshot; stop if the completion marker is set
//! 2. Evaluate the gate for `current -> current + 1`
//! 3. Compare-and-set the level (or the completion marker after the last level)
//! 4. Publish the change to live sessions
//! 5. Claim the milestone in the guard, then request message and email
//!
//! [`ProgressionEngine::advance`] repeats single steps so a project that
//! satisfies several gates catches up one level at a time.

use crate::config::{EngineConfig, MIN_STEPS_PER_PASS};
use crate::dispatch::{NotificationDispatch, NotificationRequested, Notifier};
use crate::guard::IdempotencyGuard;
use ascent_gate::{GateEvaluation, GateEvaluator, Milestone};
use ascent_metrics::{Level, LevelChanged, MetricsStore, ProjectId, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Result of one evaluation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Completion marker already set; nothing evaluated
    AlreadyComplete,
    /// Gate not satisfied
    Blocked(GateEvaluation),
    /// This caller wrote the next level
    Advanced {
        /// Applied transition
        change: LevelChanged,
        /// Notification sent, unless suppressed by the guard
        notified: Option<NotificationRequested>,
    },
    /// This caller set the completion marker
    Completed {
        /// Notification sent, unless suppressed by the guard
        notified: Option<NotificationRequested>,
    },
    /// Another writer moved the level away from `expected` first
    LostRace {
        /// Level this caller observed
        expected: Level,
    },
}

/// Accumulated outcome of an [`ProgressionEngine::advance`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Transitions written by this call, in order
    pub changes: Vec<LevelChanged>,
    /// This call set the completion marker
    pub completed_now: bool,
    /// Notifications sent by this call
    pub notifications: Vec<NotificationRequested>,
    /// Gate the call stopped on, if any
    pub blocked_on: Option<GateEvaluation>,
    /// The call stopped because another writer advanced the project
    pub lost_race: bool,
}

impl Progress {
    /// Check whether this call changed any state
    #[inline]
    #[must_use]
    pub fn moved(&self) -> bool {
        !self.changes.is_empty() || self.completed_now
    }
}

/// Guidance view of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Project
    pub project_id: ProjectId,
    /// Current level
    pub level: Level,
    /// Completion marker
    pub completed: bool,
    /// Milestone the next gate unlocks, `None` once complete
    pub next: Option<Milestone>,
    /// Unmet requirements of the next gate
    pub missing: Vec<String>,
}

/// The level state machine
#[derive(Debug)]
pub struct ProgressionEngine {
    store: Arc<dyn MetricsStore>,
    evaluator: GateEvaluator,
    guard: IdempotencyGuard,
    dispatch: NotificationDispatch,
    max_steps: usize,
}

impl ProgressionEngine {
    /// Create engine from configuration
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn MetricsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            evaluator: GateEvaluator::new(config.gates),
            guard: IdempotencyGuard::from_config(&config.guard),
            dispatch: NotificationDispatch::new(notifier, config.live_channel_capacity),
            max_steps: config.max_steps_per_pass.max(MIN_STEPS_PER_PASS),
        }
    }

    /// Create engine with an explicit guard
    #[must_use]
    pub fn with_guard(mut self, guard: IdempotencyGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Get metrics store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    /// Get idempotency guard
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Attach a live session to level changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LevelChanged> {
        self.dispatch.subscribe()
    }

    /// Evaluate and apply at most one transition
    ///
    /// # Errors
    /// Store failures; nothing is retried here
    pub async fn step(&self, project: &ProjectId) -> StoreResult<StepOutcome> {
        let snapshot = self.store.snapshot(project).await?;
        if snapshot.project.completed {
            return Ok(StepOutcome::AlreadyComplete);
        }

        let level = snapshot.project.level;
        let evaluation = self.evaluator.evaluate(level, &snapshot);
        if !evaluation.satisfied {
            tracing::debug!(
                %project,
                %level,
                missing = ?evaluation.missing_labels(),
                "gate not satisfied"
            );
            return Ok(StepOutcome::Blocked(evaluation));
        }

        match evaluation.target {
            Milestone::Level(to) => {
                let Some(change) = self.store.compare_and_set_level(project, level, to).await?
                else {
                    tracing::debug!(%project, expected = %level, "level advanced by another writer");
                    return Ok(StepOutcome::LostRace { expected: level });
                };

                tracing::info!(%project, from = %level, to = %to, "level advanced");
                self.dispatch.publish(&change);
                let notified = self.fire(project, evaluation.target).await;
                Ok(StepOutcome::Advanced { change, notified })
            }
            Milestone::Complete => {
                if !self.store.mark_completed(project).await? {
                    tracing::debug!(%project, "completion marked by another writer");
                    return Ok(StepOutcome::AlreadyComplete);
                }

                tracing::info!(%project, "journey complete");
                let notified = self.fire(project, Milestone::Complete).await;
                Ok(StepOutcome::Completed { notified })
            }
        }
    }

    /// Apply single steps until blocked, complete or out of budget
    ///
    /// Safe to call redundantly from every event path.
    ///
    /// # Errors
    /// Store failures; transitions already written stay written
    pub async fn advance(&self, project: &ProjectId) -> StoreResult<Progress> {
        let mut progress = Progress::default();

        for _ in 0..self.max_steps {
            match self.step(project).await? {
                StepOutcome::Advanced { change, notified } => {
                    progress.changes.push(change);
                    progress.notifications.extend(notified);
                }
                StepOutcome::Completed { notified } => {
                    progress.completed_now = true;
                    progress.notifications.extend(notified);
                    return Ok(progress);
                }
                StepOutcome::AlreadyComplete => return Ok(progress),
                StepOutcome::Blocked(evaluation) => {
                    progress.blocked_on = Some(evaluation);
                    return Ok(progress);
                }
                StepOutcome::LostRace { .. } => {
                    progress.lost_race = true;
                    return Ok(progress);
                }
            }
        }

        tracing::debug!(%project, steps = self.max_steps, "step budget exhausted");
        Ok(progress)
    }

    /// Current level and the unmet requirements of the next gate
    ///
    /// # Errors
    /// Store failures
    pub async fn status(&self, project: &ProjectId) -> StoreResult<ProjectStatus> {
        let snapshot = self.store.snapshot(project).await?;
        let level = snapshot.project.level;

        let (next, missing) = if snapshot.project.completed {
            (None, Vec::new())
        } else {
            let evaluation = self.evaluator.evaluate(level, &snapshot);
            (Some(evaluation.target), evaluation.missing_labels())
        };

        Ok(ProjectStatus {
            project_id: project.clone(),
            level,
            completed: snapshot.project.completed,
            next,
            missing,
        })
    }

    async fn fire(&self, project: &ProjectId, milestone: Milestone) -> Option<NotificationRequested> {
        if !self.guard.should_fire(project, milestone).await {
            return None;
        }
        let request = NotificationRequested::new(project.clone(), milestone);
        self.dispatch.notify(&request).await;
        Some(request)
    }
}
