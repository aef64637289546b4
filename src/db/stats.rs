//! Aggregation queries for statistics.

use super::Database;
use crate::error::Result;
use crate::types::QueueStats;
use rusqlite::Connection;

/// Per-status counts, mean priority and deepest chain in a single scan.
pub fn queue_stats(conn: &Connection) -> Result<QueueStats> {
    let stats = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(status = 'pending'), 0),
            COALESCE(SUM(status = 'blocked'), 0),
            COALESCE(SUM(status = 'ready'), 0),
            COALESCE(SUM(status = 'running'), 0),
            COALESCE(SUM(status = 'completed'), 0),
            COALESCE(SUM(status = 'failed'), 0),
            COALESCE(SUM(status = 'cancelled'), 0),
            COALESCE(AVG(calculated_priority), 0.0),
            COALESCE(MAX(dependency_depth), 0)
         FROM tasks",
        [],
        |row| {
            Ok(QueueStats {
                total_tasks: row.get(0)?,
                pending: row.get(1)?,
                blocked: row.get(2)?,
                ready: row.get(3)?,
                running: row.get(4)?,
                completed: row.get(5)?,
                failed: row.get(6)?,
                cancelled: row.get(7)?,
                average_priority: row.get(8)?,
                max_dependency_depth: row.get(9)?,
            })
        },
    )?;
    Ok(stats)
}

impl Database {
    /// Get aggregate queue statistics.
    pub fn get_stats(&self) -> Result<QueueStats> {
        self.with_conn(queue_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_has_zeroed_stats() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_stats().unwrap(), QueueStats::default());
    }

    #[test]
    fn stats_count_each_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO tasks (id, description, status, calculated_priority, dependency_depth, submitted_at)
                 VALUES ('a', 'a', 'ready', 40.0, 0, 1),
                        ('b', 'b', 'ready', 60.0, 1, 2),
                        ('c', 'c', 'blocked', 20.0, 3, 3),
                        ('d', 'd', 'failed', 0.0, 0, 4);",
            )?;
            Ok(())
        })
        .unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.ready, 2);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert!((stats.average_priority - 30.0).abs() < 1e-9);
        assert_eq!(stats.max_dependency_depth, 3);
    }
}
