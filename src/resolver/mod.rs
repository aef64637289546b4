//! Dependency graph questions: cycles, depth, ordering and readiness.
//!
//! Structural queries (cycle detection, depth, execution order) run
//! against a cached snapshot of the edge set. Readiness queries depend on
//! resolution state that changes inside the caller's transaction, so they
//! always read the store directly.

mod cache;

pub use cache::{GraphCache, GraphSnapshot};

use crate::db::{deps, tasks};
use crate::error::{QueueError, Result};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Default lifetime of a graph snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

pub struct DependencyResolver {
    cache: Mutex<GraphCache>,
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl DependencyResolver {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(GraphCache::new(cache_ttl)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, GraphCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop cached graph state around `task_id`. Called after every edge
    /// insert or resolution, whether or not the write committed.
    pub fn invalidate(&self, task_id: &str) {
        debug!(task_id, "Invalidating dependency graph cache");
        self.cache().invalidate(task_id);
    }

    /// Drop all cached graph state.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Reject the edge `dependent -> prerequisite` if it would close a
    /// cycle, i.e. if `dependent` is already reachable from `prerequisite`
    /// along prerequisite edges.
    pub fn validate_new_dependency(
        &self,
        conn: &Connection,
        dependent: &str,
        prerequisite: &str,
    ) -> Result<()> {
        if dependent == prerequisite {
            return Err(QueueError::CircularDependency {
                path: vec![dependent.to_string(), prerequisite.to_string()],
            });
        }

        let graph = self.cache().snapshot(conn)?;

        // Iterative DFS; `parent` lets us rebuild the offending path
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([prerequisite]);
        let mut stack = vec![prerequisite];

        while let Some(current) = stack.pop() {
            for next in graph.prerequisites_of(current) {
                let next = next.as_str();
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == dependent {
                    // dependent -> prerequisite -> ... -> dependent
                    let mut path = vec![dependent.to_string()];
                    let mut chain = vec![next];
                    let mut node = next;
                    while let Some(&up) = parent.get(node) {
                        chain.push(up);
                        node = up;
                    }
                    path.extend(chain.into_iter().rev().map(str::to_string));
                    return Err(QueueError::CircularDependency { path });
                }
                stack.push(next);
            }
        }

        Ok(())
    }

    /// Longest prerequisite chain beneath `task_id`: 0 for roots, else
    /// `1 + max(depth(prerequisite))`. Memoized until invalidated.
    pub fn calculate_dependency_depth(&self, conn: &Connection, task_id: &str) -> Result<u32> {
        let mut cache = self.cache();
        let graph = cache.snapshot(conn)?;
        if let Some(depth) = cache.depth(task_id) {
            return Ok(depth);
        }
        let memo = cache.depths_mut();

        // Post-order walk with an explicit stack
        let mut in_progress: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, bool)> = vec![(task_id.to_string(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if memo.contains_key(&node) {
                continue;
            }
            let prerequisites = graph.prerequisites_of(&node);
            if expanded {
                let depth = prerequisites
                    .iter()
                    .filter_map(|p| memo.get(p))
                    .map(|d| d + 1)
                    .max()
                    .unwrap_or(0);
                in_progress.remove(&node);
                memo.insert(node, depth);
                continue;
            }
            if !in_progress.insert(node.clone()) {
                let mut path: Vec<String> = in_progress.into_iter().collect();
                path.sort();
                return Err(QueueError::CircularDependency { path });
            }
            stack.push((node.clone(), true));
            for prerequisite in prerequisites {
                if !memo.contains_key(prerequisite) {
                    if in_progress.contains(prerequisite) {
                        return Err(QueueError::CircularDependency {
                            path: vec![node.clone(), prerequisite.clone(), node],
                        });
                    }
                    stack.push((prerequisite.clone(), false));
                }
            }
        }

        Ok(memo.get(task_id).copied().unwrap_or(0))
    }

    /// Depth a new task would have with the given prerequisites.
    pub fn depth_for_prerequisites(
        &self,
        conn: &Connection,
        prerequisites: &[String],
    ) -> Result<u32> {
        let mut depth = 0;
        for prerequisite in prerequisites {
            depth = depth.max(self.calculate_dependency_depth(conn, prerequisite)? + 1);
        }
        Ok(depth)
    }

    /// Group `task_ids` into batches with Kahn's algorithm: every task's
    /// prerequisites inside the set sit in earlier batches, so each batch
    /// can run in parallel once the previous one is done. Within a batch,
    /// tasks keep their input order.
    pub fn get_execution_order(
        &self,
        conn: &Connection,
        task_ids: &[String],
    ) -> Result<Vec<Vec<String>>> {
        let mut order: Vec<&str> = Vec::with_capacity(task_ids.len());
        let mut position: HashMap<&str, usize> = HashMap::new();
        for id in task_ids {
            if position.contains_key(id.as_str()) {
                continue;
            }
            if !tasks::task_exists(conn, id)? {
                return Err(QueueError::task_not_found(id));
            }
            position.insert(id.as_str(), order.len());
            order.push(id.as_str());
        }

        let graph = self.cache().snapshot(conn)?;

        let mut in_degree: HashMap<&str, usize> = order
            .iter()
            .map(|&id| {
                let inside = graph
                    .prerequisites_of(id)
                    .iter()
                    .filter(|p| position.contains_key(p.as_str()))
                    .count();
                (id, inside)
            })
            .collect();

        let mut batch: Vec<&str> = order
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut batches = Vec::new();
        let mut placed = 0;

        while !batch.is_empty() {
            let mut next: Vec<&str> = Vec::new();
            for &id in &batch {
                for dependent in graph.dependents_of(id) {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.as_str());
                        }
                    }
                }
            }
            next.sort_by_key(|id| position[id]);
            placed += batch.len();
            batches.push(batch.iter().map(|id| id.to_string()).collect());
            batch = next;
        }

        if placed < order.len() {
            let path = order
                .iter()
                .filter(|id| in_degree[*id] > 0)
                .map(|id| id.to_string())
                .collect();
            return Err(QueueError::CircularDependency { path });
        }

        Ok(batches)
    }

    /// True when every edge of `task_id` has been resolved.
    pub fn are_all_dependencies_met(&self, conn: &Connection, task_id: &str) -> Result<bool> {
        Ok(deps::count_unresolved(conn, task_id)? == 0)
    }

    /// Non-terminal tasks still waiting on `prerequisite`.
    pub fn get_blocked_tasks(&self, conn: &Connection, prerequisite: &str) -> Result<Vec<String>> {
        deps::waiting_dependents(conn, prerequisite)
    }

    /// Every direct dependent of `task_id`, resolved or not.
    pub fn get_dependents(&self, conn: &Connection, task_id: &str) -> Result<Vec<String>> {
        deps::dependents(conn, task_id)
    }

    /// Every task that transitively waits on `task_id`, nearest first.
    pub fn transitive_dependents(&self, conn: &Connection, task_id: &str) -> Result<Vec<String>> {
        let graph = self.cache().snapshot(conn)?;
        let mut seen = HashSet::from([task_id]);
        let mut ordered = Vec::new();
        let mut frontier = vec![task_id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in frontier {
                for dependent in graph.dependents_of(id) {
                    if seen.insert(dependent.as_str()) {
                        ordered.push(dependent.clone());
                        next.push(dependent.as_str());
                    }
                }
            }
            frontier = next;
        }
        Ok(ordered)
    }
}
