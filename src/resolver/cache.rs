//! In-memory snapshot of the dependency graph.

use crate::db::deps;
use crate::error::Result;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Adjacency lists for every stored edge, in both directions.
#[derive(Debug, Default)]
pub struct GraphSnapshot {
    /// dependent -> prerequisites
    prerequisites: HashMap<String, Vec<String>>,
    /// prerequisite -> dependents
    dependents: HashMap<String, Vec<String>>,
}

impl GraphSnapshot {
    pub fn from_edges(edges: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut snapshot = Self::default();
        for (dependent, prerequisite) in edges {
            snapshot
                .dependents
                .entry(prerequisite.clone())
                .or_default()
                .push(dependent.clone());
            snapshot
                .prerequisites
                .entry(dependent)
                .or_default()
                .push(prerequisite);
        }
        snapshot
    }

    pub fn prerequisites_of(&self, task_id: &str) -> &[String] {
        self.prerequisites
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.dependents
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `task_id` plus every task that transitively waits on it.
    pub fn lineage(&self, task_id: &str) -> HashSet<String> {
        let mut seen = HashSet::from([task_id.to_string()]);
        let mut queue = VecDeque::from([task_id]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents_of(current) {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }

    pub fn edge_count(&self) -> usize {
        self.prerequisites.values().map(Vec::len).sum()
    }
}

/// Owned graph cache: an edge snapshot that expires after `ttl`, plus
/// memoized dependency depths.
///
/// Writers call `invalidate` after touching an edge. That drops the
/// snapshot and the memoized depths of the affected lineage; depths of
/// unrelated tasks survive until the TTL expires.
///
/// Commits made through other connections to the same file are caught by
/// SQLite's `data_version`, which changes whenever another connection
/// commits. Any change discards everything cached.
#[derive(Debug)]
pub struct GraphCache {
    ttl: Duration,
    snapshot: Option<(Arc<GraphSnapshot>, Instant)>,
    depths: HashMap<String, u32>,
    data_version: Option<i64>,
}

impl GraphCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: None,
            depths: HashMap::new(),
            data_version: None,
        }
    }

    /// Current snapshot, reloading from `conn` when missing, expired, or
    /// outdated by another connection's commit.
    ///
    /// Memoized depths are only valid against the snapshot returned here,
    /// so callers must fetch it before reading `depth`.
    pub fn snapshot(&mut self, conn: &Connection) -> Result<Arc<GraphSnapshot>> {
        let version: i64 = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
        if self.data_version != Some(version) {
            if self.data_version.is_some() {
                debug!(version, "Database changed by another connection, dropping graph cache");
            }
            self.clear();
            self.data_version = Some(version);
        }

        if let Some((snapshot, loaded_at)) = &self.snapshot {
            if loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(snapshot));
            }
            // Expired
            self.depths.clear();
        }

        let snapshot = Arc::new(GraphSnapshot::from_edges(deps::all_edges(conn)?));
        debug!(edges = snapshot.edge_count(), "Loaded dependency graph snapshot");
        self.snapshot = Some((Arc::clone(&snapshot), Instant::now()));
        Ok(snapshot)
    }

    pub fn depth(&self, task_id: &str) -> Option<u32> {
        self.depths.get(task_id).copied()
    }

    pub fn depths_mut(&mut self) -> &mut HashMap<String, u32> {
        &mut self.depths
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Forget everything derived from the edges around `task_id`.
    pub fn invalidate(&mut self, task_id: &str) {
        match self.snapshot.take() {
            Some((snapshot, _)) => {
                for stale in snapshot.lineage(task_id) {
                    self.depths.remove(&stale);
                }
            }
            // Lineage unknown without a snapshot
            None => self.depths.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
        self.depths.clear();
    }

    #[cfg(test)]
    fn loaded_version(&self) -> Option<i64> {
        self.data_version
    }
}
