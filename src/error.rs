//! Structured errors for queue operations.

use crate::types::TaskStatus;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Graph errors
    CircularDependency,
    PrerequisiteNotFound,
    PrerequisiteUnsatisfiable,
    DependencyLimitExceeded,

    // State errors
    TaskNotFound,
    InvalidTransition,

    // Validation errors
    InvalidInput,
    InvalidConfig,

    // Internal errors
    DatabaseError,
    /// Failures outside the queue itself, such as I/O or serialization.
    InternalError,
}

/// Which dependency limit a submission ran into.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Too many prerequisites on one task.
    Dependencies,
    /// Prerequisite chain too long.
    Depth,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Dependencies => f.write_str("prerequisite count"),
            LimitKind::Depth => f.write_str("dependency depth"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("dependency cycle: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("prerequisite task not found: {task_id}")]
    PrerequisiteNotFound { task_id: String },

    #[error("prerequisite task {task_id} is {status} and can never complete")]
    PrerequisiteUnsatisfiable { task_id: String, status: TaskStatus },

    #[error("task {task_id} exceeds {kind} limit: {actual} > {max}")]
    DependencyLimitExceeded {
        task_id: String,
        kind: LimitKind,
        actual: u64,
        max: u64,
    },

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(#[from] refinery::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

impl QueueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QueueError::CircularDependency { .. } => ErrorCode::CircularDependency,
            QueueError::PrerequisiteNotFound { .. } => ErrorCode::PrerequisiteNotFound,
            QueueError::PrerequisiteUnsatisfiable { .. } => ErrorCode::PrerequisiteUnsatisfiable,
            QueueError::DependencyLimitExceeded { .. } => ErrorCode::DependencyLimitExceeded,
            QueueError::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            QueueError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            QueueError::InvalidInput { .. } => ErrorCode::InvalidInput,
            QueueError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            QueueError::Database(_) | QueueError::Migration(_) => ErrorCode::DatabaseError,
        }
    }

    // Convenience constructors

    pub fn task_not_found(task_id: &str) -> Self {
        QueueError::TaskNotFound {
            task_id: task_id.to_string(),
        }
    }

    pub fn prerequisite_not_found(task_id: &str) -> Self {
        QueueError::PrerequisiteNotFound {
            task_id: task_id.to_string(),
        }
    }

    pub fn invalid_transition(task_id: &str, from: TaskStatus, to: TaskStatus) -> Self {
        QueueError::InvalidTransition {
            task_id: task_id.to_string(),
            from,
            to,
        }
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        QueueError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn limit_exceeded(task_id: &str, kind: LimitKind, actual: u64, max: u64) -> Self {
        QueueError::DependencyLimitExceeded {
            task_id: task_id.to_string(),
            kind,
            actual,
            max,
        }
    }
}

/// Serializable error body printed by the CLI.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&QueueError> for ErrorResponse {
    fn from(err: &QueueError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<&anyhow::Error> for ErrorResponse {
    /// Queue errors keep their own code, even under added context.
    fn from(err: &anyhow::Error) -> Self {
        let code = err
            .downcast_ref::<QueueError>()
            .map_or(ErrorCode::InternalError, QueueError::code);
        Self {
            code,
            message: format!("{err:#}"),
        }
    }
}
