//! Dependency edge storage.

use super::Database;
use crate::error::Result;
use crate::types::TaskDependency;
use rusqlite::{Connection, Row, params};

const DEPENDENCY_COLUMNS: &str =
    "dependent_task_id, prerequisite_task_id, dependency_type, created_at, resolved_at";

fn parse_dependency_row(row: &Row) -> rusqlite::Result<TaskDependency> {
    Ok(TaskDependency {
        dependent_task_id: row.get(0)?,
        prerequisite_task_id: row.get(1)?,
        dependency_type: row.get(2)?,
        created_at: row.get(3)?,
        resolved_at: row.get(4)?,
    })
}

fn query_ids(conn: &Connection, sql: &str, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Insert an edge. Returns false if the pair already existed.
pub fn insert_task_dependency(conn: &Connection, dependency: &TaskDependency) -> Result<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO task_dependencies ({DEPENDENCY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            dependency.dependent_task_id,
            dependency.prerequisite_task_id,
            dependency.dependency_type,
            dependency.created_at,
            dependency.resolved_at,
        ],
    )?;
    Ok(inserted > 0)
}

/// Edges on which `task_id` waits.
pub fn get_task_dependencies(conn: &Connection, task_id: &str) -> Result<Vec<TaskDependency>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies
         WHERE dependent_task_id = ?1
         ORDER BY created_at, prerequisite_task_id"
    ))?;
    let deps = stmt
        .query_map(params![task_id], parse_dependency_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(deps)
}

/// Mark the edge resolved. Returns false if it was missing or already
/// resolved.
pub fn resolve_dependency(
    conn: &Connection,
    dependent_task_id: &str,
    prerequisite_task_id: &str,
    resolved_at: i64,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE task_dependencies SET resolved_at = ?1
         WHERE dependent_task_id = ?2 AND prerequisite_task_id = ?3
         AND resolved_at IS NULL",
        params![resolved_at, dependent_task_id, prerequisite_task_id],
    )?;
    Ok(updated > 0)
}

/// Number of edges of `task_id` still waiting on a prerequisite.
pub fn count_unresolved(conn: &Connection, task_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_dependencies
         WHERE dependent_task_id = ?1 AND resolved_at IS NULL",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Non-terminal tasks still waiting on `prerequisite_task_id`.
pub fn waiting_dependents(conn: &Connection, prerequisite_task_id: &str) -> Result<Vec<String>> {
    query_ids(
        conn,
        "SELECT d.dependent_task_id FROM task_dependencies d
         INNER JOIN tasks t ON t.id = d.dependent_task_id
         WHERE d.prerequisite_task_id = ?1 AND d.resolved_at IS NULL
         AND t.status NOT IN ('completed', 'failed', 'cancelled')
         ORDER BY d.created_at, d.dependent_task_id",
        prerequisite_task_id,
    )
}

/// Every task with an edge to `prerequisite_task_id`, whether or not the
/// dependent row still exists.
pub fn dependents(conn: &Connection, prerequisite_task_id: &str) -> Result<Vec<String>> {
    query_ids(
        conn,
        "SELECT dependent_task_id FROM task_dependencies
         WHERE prerequisite_task_id = ?1
         ORDER BY created_at, dependent_task_id",
        prerequisite_task_id,
    )
}

/// Every edge as `(dependent, prerequisite)`.
pub fn all_edges(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT dependent_task_id, prerequisite_task_id FROM task_dependencies")?;
    let edges = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(edges)
}

impl Database {
    /// Get the edges on which a task waits.
    pub fn get_task_dependencies(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        self.with_conn(|conn| get_task_dependencies(conn, task_id))
    }

    /// Get every dependency edge.
    pub fn get_all_dependencies(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(all_edges)
    }
}
