//! Core types for the agent task queue.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base priority assigned when the submitter does not choose one.
pub const DEFAULT_BASE_PRIORITY: u8 = 5;

/// Highest accepted base priority.
pub const MAX_BASE_PRIORITY: u8 = 10;

/// Implements the text round-trip used by the store and the CLI for a
/// closed enum: `as_str`, `Display`, `FromStr`, and the rusqlite traits.
macro_rules! text_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("invalid {}: {}", $what, other)),
                }
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, readiness not yet decided.
    Pending,
    /// At least one prerequisite is unresolved.
    Blocked,
    /// Eligible for dequeue.
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(TaskStatus, "task status", {
    Pending => "pending",
    Blocked => "blocked",
    Ready => "ready",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Blocked,
        TaskStatus::Ready,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Completed, failed and cancelled tasks never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match self {
            Pending => matches!(next, Blocked | Ready | Cancelled),
            Blocked => matches!(next, Ready | Cancelled),
            Ready => matches!(next, Running | Blocked | Cancelled),
            Running => matches!(next, Completed | Failed | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }
}

/// Where a task was submitted from. Human work outranks agent work of
/// equal base priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    #[default]
    Human,
    AgentRequirements,
    AgentPlanner,
    AgentImplementation,
}

text_enum!(TaskSource, "task source", {
    Human => "human",
    AgentRequirements => "agent_requirements",
    AgentPlanner => "agent_planner",
    AgentImplementation => "agent_implementation",
});

/// How a task waits on its prerequisites.
///
/// Both variants resolve with AND semantics: the task is ready only once
/// every prerequisite has completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    Sequential,
    Parallel,
}

text_enum!(DependencyType, "dependency type", {
    Sequential => "sequential",
    Parallel => "parallel",
});

/// A task in the queue. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub source: TaskSource,
    pub dependency_type: DependencyType,
    /// User-supplied seed, 0-10.
    pub base_priority: u8,
    /// Derived score, 0-100.
    pub calculated_priority: f64,
    pub deadline: Option<i64>,
    pub estimated_duration_seconds: Option<u32>,
    /// Longest prerequisite chain beneath this task; roots are 0.
    pub dependency_depth: u32,
    pub parent_task_id: Option<String>,
    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error_message: Option<String>,
}

/// Submission request for `TaskQueueService::enqueue_task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    /// Custom task ID (UUID7 generated if not provided).
    pub id: Option<String>,
    pub description: String,
    pub source: TaskSource,
    pub prerequisites: Vec<String>,
    pub dependency_type: DependencyType,
    pub base_priority: u8,
    pub deadline: Option<i64>,
    pub estimated_duration_seconds: Option<u32>,
    pub parent_task_id: Option<String>,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
            source: TaskSource::default(),
            prerequisites: Vec::new(),
            dependency_type: DependencyType::default(),
            base_priority: DEFAULT_BASE_PRIORITY,
            deadline: None,
            estimated_duration_seconds: None,
            parent_task_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency_type(mut self, dependency_type: DependencyType) -> Self {
        self.dependency_type = dependency_type;
        self
    }

    pub fn with_priority(mut self, base_priority: u8) -> Self {
        self.base_priority = base_priority;
        self
    }

    pub fn with_deadline(mut self, deadline_ms: i64) -> Self {
        self.deadline = Some(deadline_ms);
        self
    }

    pub fn with_estimated_duration(mut self, seconds: u32) -> Self {
        self.estimated_duration_seconds = Some(seconds);
        self
    }

    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }
}

/// Directed edge: `dependent_task_id` waits on `prerequisite_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub dependent_task_id: String,
    pub prerequisite_task_id: String,
    /// Copied from the dependent task's declared type.
    pub dependency_type: DependencyType,
    pub created_at: i64,
    /// Set once the prerequisite completes.
    pub resolved_at: Option<i64>,
}

impl TaskDependency {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// One status change in a task's audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTransition {
    pub id: i64,
    pub task_id: String,
    /// `None` for the creation row.
    pub from_status: Option<TaskStatus>,
    pub to_status: TaskStatus,
    pub reason: Option<String>,
    pub timestamp: i64,
}

/// Aggregate queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_tasks: i64,
    pub pending: i64,
    pub blocked: i64,
    pub ready: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    /// Mean `calculated_priority` across all tasks (0 when empty).
    pub average_priority: f64,
    pub max_dependency_depth: u32,
}

impl QueueStats {
    pub fn count(&self, status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Blocked => self.blocked,
            TaskStatus::Ready => self.ready,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }
}

/// Filter for listing tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub parent_task_id: Option<String>,
    pub limit: Option<usize>,
}
