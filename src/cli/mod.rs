//! CLI command definitions for the `task-queue` binary.
//!
//! Every command prints its result as pretty JSON on stdout. Failures
//! print a `{ "code", "message" }` object and exit non-zero.

use crate::types::{DEFAULT_BASE_PRIORITY, DependencyType, TaskSource, TaskStatus};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};

/// Dependency-aware, priority-ordered task queue
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a new task
    Enqueue(EnqueueArgs),

    /// Claim the highest-priority ready task
    Next,

    /// Mark a running task completed
    Complete {
        /// Task ID
        id: String,
    },

    /// Mark a running task failed and cancel its dependents
    Fail {
        /// Task ID
        id: String,

        /// Failure reason recorded on the task
        #[arg(short, long, default_value = "failed")]
        error: String,
    },

    /// Cancel a task and its dependents
    Cancel {
        /// Task ID
        id: String,
    },

    /// Show queue statistics
    Status,

    /// Show the batched execution order of a set of tasks
    Plan {
        /// Task IDs to order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show one task with its dependency edges
    Show {
        /// Task ID
        id: String,
    },

    /// List tasks in dequeue order
    List(ListArgs),

    /// Show the status history of a task
    History {
        /// Task ID
        id: String,
    },

    /// Make an existing task wait on another
    Link {
        /// Task that will wait
        dependent: String,

        /// Task it waits on
        prerequisite: String,
    },

    /// Recalculate priorities (all unfinished tasks when no IDs are given)
    Recalc {
        /// Task IDs to rescore
        ids: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// What the task should accomplish
    pub description: String,

    /// Custom task ID (UUID7 generated if omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Prerequisite task IDs
    #[arg(short, long, value_name = "IDS", value_delimiter = ',')]
    pub after: Vec<String>,

    /// Base priority 0-10
    #[arg(short, long, default_value_t = DEFAULT_BASE_PRIORITY)]
    pub priority: u8,

    /// Who submitted the task
    #[arg(short, long, default_value_t = TaskSource::Human)]
    pub source: TaskSource,

    /// How the task waits on its prerequisites
    #[arg(long, default_value_t = DependencyType::Sequential)]
    pub dependency_type: DependencyType,

    /// Deadline as an RFC 3339 timestamp
    #[arg(long, value_parser = parse_deadline)]
    pub deadline: Option<i64>,

    /// Estimated duration in seconds
    #[arg(long, value_name = "SECONDS")]
    pub estimate: Option<u32>,

    /// Parent task ID
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only tasks in this status
    #[arg(long)]
    pub status: Option<TaskStatus>,

    /// Only children of this task
    #[arg(long)]
    pub parent: Option<String>,

    /// Maximum number of tasks
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Parse an RFC 3339 timestamp into epoch milliseconds.
pub fn parse_deadline(value: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| format!("invalid deadline '{value}': {e}"))
}
