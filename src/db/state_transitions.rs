//! Audit trail of task status changes.

use crate::db::{Database, now_ms};
use crate::error::Result;
use crate::types::{TaskStatus, TaskTransition};
use rusqlite::{Connection, params};

/// Record a status change. Runs on the caller's connection so the audit
/// row commits or rolls back together with the change itself.
pub(crate) fn record_transition(
    conn: &Connection,
    task_id: &str,
    from: Option<TaskStatus>,
    to: TaskStatus,
    reason: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_transitions (task_id, from_status, to_status, reason, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, from, to, reason, now_ms()],
    )?;
    Ok(())
}

pub fn get_task_history(conn: &Connection, task_id: &str) -> Result<Vec<TaskTransition>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, from_status, to_status, reason, timestamp
         FROM task_transitions
         WHERE task_id = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![task_id], |row| {
            Ok(TaskTransition {
                id: row.get(0)?,
                task_id: row.get(1)?,
                from_status: row.get(2)?,
                to_status: row.get(3)?,
                reason: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

impl Database {
    /// Get the status history for a task, oldest first.
    pub fn get_task_history(&self, task_id: &str) -> Result<Vec<TaskTransition>> {
        self.with_conn(|conn| get_task_history(conn, task_id))
    }
}
