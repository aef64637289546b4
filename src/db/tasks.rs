//! Task rows: insert, lookup, status changes and the dequeue claim.

use super::state_transitions::record_transition;
use super::{Database, now_ms};
use crate::error::{QueueError, Result};
use crate::types::{Task, TaskFilter, TaskStatus};
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_COLUMNS: &str = "id, description, status, source, dependency_type, base_priority,
    calculated_priority, deadline, estimated_duration_seconds, dependency_depth,
    parent_task_id, submitted_at, started_at, completed_at, error_message";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        description: row.get("description")?,
        status: row.get("status")?,
        source: row.get("source")?,
        dependency_type: row.get("dependency_type")?,
        base_priority: row.get("base_priority")?,
        calculated_priority: row.get("calculated_priority")?,
        deadline: row.get("deadline")?,
        estimated_duration_seconds: row.get("estimated_duration_seconds")?,
        dependency_depth: row.get("dependency_depth")?,
        parent_task_id: row.get("parent_task_id")?,
        submitted_at: row.get("submitted_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        error_message: row.get("error_message")?,
    })
}

/// Insert a task row exactly as given and record its creation in the
/// audit trail.
pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO tasks ({TASK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            task.id,
            task.description,
            task.status,
            task.source,
            task.dependency_type,
            task.base_priority,
            task.calculated_priority,
            task.deadline,
            task.estimated_duration_seconds,
            task.dependency_depth,
            task.parent_task_id,
            task.submitted_at,
            task.started_at,
            task.completed_at,
            task.error_message,
        ],
    )?;
    record_transition(conn, &task.id, None, task.status, None)?;
    Ok(())
}

pub fn get_task(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Like `get_task`, but a missing row is a `TaskNotFound` error.
pub fn require_task(conn: &Connection, task_id: &str) -> Result<Task> {
    get_task(conn, task_id)?.ok_or_else(|| QueueError::task_not_found(task_id))
}

pub fn task_exists(conn: &Connection, task_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Move a task from `from` to `to`, stamping `started_at` on entry to
/// running and `completed_at` on entry to a terminal state.
///
/// The update is guarded on the current status, so a row that changed
/// underneath the caller is reported as an invalid transition instead of
/// being overwritten.
pub fn update_task_status(
    conn: &Connection,
    task_id: &str,
    from: TaskStatus,
    to: TaskStatus,
    reason: Option<&str>,
) -> Result<()> {
    if !from.can_transition_to(to) {
        return Err(QueueError::invalid_transition(task_id, from, to));
    }

    let now = now_ms();
    let started_at = (to == TaskStatus::Running).then_some(now);
    let completed_at = to.is_terminal().then_some(now);

    let updated = conn.execute(
        "UPDATE tasks SET
            status = ?1,
            started_at = COALESCE(?2, started_at),
            completed_at = COALESCE(?3, completed_at)
         WHERE id = ?4 AND status = ?5",
        params![to, started_at, completed_at, task_id, from],
    )?;

    if updated == 0 {
        let current = require_task(conn, task_id)?;
        return Err(QueueError::invalid_transition(task_id, current.status, to));
    }

    record_transition(conn, task_id, Some(from), to, reason)?;
    Ok(())
}

pub fn set_error_message(conn: &Connection, task_id: &str, message: &str) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET error_message = ?1 WHERE id = ?2",
        params![message, task_id],
    )?;
    Ok(())
}

pub fn update_priority(conn: &Connection, task_id: &str, priority: f64) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET calculated_priority = ?1 WHERE id = ?2",
        params![priority, task_id],
    )?;
    Ok(())
}

pub fn update_depth(conn: &Connection, task_id: &str, depth: u32) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET dependency_depth = ?1 WHERE id = ?2",
        params![depth, task_id],
    )?;
    Ok(())
}

/// Pick the highest-priority ready task (FIFO among equals) and mark it
/// running. Must run inside an immediate transaction.
pub fn claim_next_ready(conn: &Connection) -> Result<Option<Task>> {
    let next: Option<String> = conn
        .query_row(
            "SELECT id FROM tasks
             WHERE status = 'ready'
             ORDER BY calculated_priority DESC, submitted_at ASC, rowid ASC
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let Some(task_id) = next else {
        return Ok(None);
    };

    update_task_status(conn, &task_id, TaskStatus::Ready, TaskStatus::Running, None)?;
    get_task(conn, &task_id)
}

/// Ids of every task that has not reached a terminal state.
pub fn active_task_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM tasks
         WHERE status NOT IN ('completed', 'failed', 'cancelled')
         ORDER BY rowid",
    )?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

pub fn list_tasks(conn: &Connection, filter: &TaskFilter) -> Result<Vec<Task>> {
    let limit = filter
        .limit
        .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
        .unwrap_or(-1);

    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE (?1 IS NULL OR status = ?1)
         AND (?2 IS NULL OR parent_task_id = ?2)
         ORDER BY calculated_priority DESC, submitted_at ASC, rowid ASC
         LIMIT ?3"
    ))?;

    let tasks = stmt
        .query_map(
            params![filter.status, filter.parent_task_id, limit],
            parse_task_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

impl Database {
    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task(conn, task_id))
    }

    /// List tasks ordered the way they would be dequeued.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| list_tasks(conn, filter))
    }
}
