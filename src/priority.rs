//! Multi-factor priority scoring.
//!
//! `calculated_priority` blends five 0-100 factors with weights that sum
//! to one, so the result stays inside 0-100:
//!
//! | factor   | source                                              |
//! |----------|-----------------------------------------------------|
//! | base     | `base_priority * 10`                                |
//! | depth    | `dependency_depth * 10`, capped at 100              |
//! | urgency  | deadline proximity, 50 when there is no deadline    |
//! | blocking | `50 * log10(1 + waiting dependents)`, capped at 100 |
//! | source   | configured tier for the submitting source           |

use crate::config::PriorityConfig;
use crate::db::{now_ms, tasks};
use crate::error::{QueueError, Result};
use crate::resolver::DependencyResolver;
use crate::types::{Task, TaskSource};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Urgency of a task without a deadline.
const NEUTRAL_URGENCY: f64 = 50.0;

/// Relative weight of each factor. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub base: f64,
    pub depth: f64,
    pub urgency: f64,
    pub blocking: f64,
    pub source: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            base: 0.30,
            depth: 0.25,
            urgency: 0.25,
            blocking: 0.15,
            source: 0.05,
        }
    }
}

impl PriorityWeights {
    pub fn validate(&self) -> Result<()> {
        let all = [self.base, self.depth, self.urgency, self.blocking, self.source];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(QueueError::InvalidConfig(format!(
                "priority weights must be finite and non-negative: {self:?}"
            )));
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(QueueError::InvalidConfig(format!(
                "priority weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Per-factor scores behind one priority value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorityFactors {
    pub base: f64,
    pub depth: f64,
    pub urgency: f64,
    pub blocking: f64,
    pub source: f64,
}

impl PriorityFactors {
    pub fn weighted(&self, weights: &PriorityWeights) -> f64 {
        let score = self.base * weights.base
            + self.depth * weights.depth
            + self.urgency * weights.urgency
            + self.blocking * weights.blocking
            + self.source * weights.source;
        score.clamp(0.0, 100.0)
    }
}

pub struct PriorityCalculator {
    weights: PriorityWeights,
    urgency_floor: f64,
    urgency_horizon_seconds: f64,
    source_scores: BTreeMap<TaskSource, f64>,
}

impl PriorityCalculator {
    /// Build a calculator, rejecting weights that do not sum to 1.0.
    pub fn new(config: &PriorityConfig) -> Result<Self> {
        config.weights.validate()?;
        if !(0.0..=100.0).contains(&config.urgency_floor) {
            return Err(QueueError::InvalidConfig(format!(
                "urgency_floor must be within 0-100, got {}",
                config.urgency_floor
            )));
        }
        if config.urgency_horizon_seconds.is_nan() || config.urgency_horizon_seconds <= 0.0 {
            return Err(QueueError::InvalidConfig(format!(
                "urgency_horizon_seconds must be positive, got {}",
                config.urgency_horizon_seconds
            )));
        }

        Ok(Self {
            weights: config.weights,
            urgency_floor: config.urgency_floor,
            urgency_horizon_seconds: config.urgency_horizon_seconds,
            source_scores: config.source_scores.clone(),
        })
    }

    pub fn weights(&self) -> &PriorityWeights {
        &self.weights
    }

    /// Score `task` as of now. `blocked_count` is the number of tasks still
    /// waiting on it.
    pub fn calculate(&self, task: &Task, blocked_count: usize) -> f64 {
        self.calculate_at(task, blocked_count, now_ms())
    }

    pub fn calculate_at(&self, task: &Task, blocked_count: usize, now: i64) -> f64 {
        self.factors(task, blocked_count, now).weighted(&self.weights)
    }

    pub fn factors(&self, task: &Task, blocked_count: usize, now: i64) -> PriorityFactors {
        PriorityFactors {
            base: base_score(task.base_priority),
            depth: depth_score(task.dependency_depth),
            urgency: self.urgency_score(task, now),
            blocking: blocking_score(blocked_count),
            source: self.source_score(task.source),
        }
    }

    /// 100 once the deadline has passed or the remaining time no longer
    /// covers the estimate; otherwise decays exponentially with the slack
    /// toward `urgency_floor`.
    pub fn urgency_score(&self, task: &Task, now: i64) -> f64 {
        let Some(deadline) = task.deadline else {
            return NEUTRAL_URGENCY;
        };

        let remaining = deadline.saturating_sub(now) as f64 / 1000.0;
        let estimate = f64::from(task.estimated_duration_seconds.unwrap_or(0));
        if remaining <= 0.0 || remaining < estimate {
            return 100.0;
        }

        let slack = remaining - estimate;
        let decay = (-slack / self.urgency_horizon_seconds).exp();
        self.urgency_floor + (100.0 - self.urgency_floor) * decay
    }

    pub fn source_score(&self, source: TaskSource) -> f64 {
        match self.source_scores.get(&source) {
            Some(score) => score.clamp(0.0, 100.0),
            None => {
                warn!(source = %source, "No priority tier configured for task source, scoring 0");
                0.0
            }
        }
    }

    /// Recompute and persist one task's priority. Returns `None` if the
    /// task no longer exists.
    pub fn recalculate(
        &self,
        conn: &Connection,
        resolver: &DependencyResolver,
        task_id: &str,
    ) -> Result<Option<f64>> {
        let Some(task) = tasks::get_task(conn, task_id)? else {
            return Ok(None);
        };
        let blocked = resolver.get_blocked_tasks(conn, task_id)?.len();
        let priority = self.calculate(&task, blocked);
        tasks::update_priority(conn, task_id, priority)?;
        debug!(task_id, priority, "Recalculated priority");
        Ok(Some(priority))
    }

    /// Recompute and persist priorities for `task_ids`, skipping ids that
    /// no longer exist. Returns the ids that were updated with their new
    /// scores.
    pub fn recalculate_priorities(
        &self,
        conn: &Connection,
        resolver: &DependencyResolver,
        task_ids: &[String],
    ) -> Result<Vec<(String, f64)>> {
        let mut updated = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            match self.recalculate(conn, resolver, task_id)? {
                Some(priority) => updated.push((task_id.clone(), priority)),
                None => warn!(task_id = %task_id, "Skipping priority recalculation for missing task"),
            }
        }
        Ok(updated)
    }
}

fn base_score(base_priority: u8) -> f64 {
    (f64::from(base_priority) * 10.0).clamp(0.0, 100.0)
}

fn depth_score(depth: u32) -> f64 {
    (f64::from(depth) * 10.0).min(100.0)
}

// Logarithmic so runaway fan-out cannot dominate the score
fn blocking_score(blocked_count: usize) -> f64 {
    (50.0 * (1.0 + blocked_count as f64).log10()).min(100.0)
}
