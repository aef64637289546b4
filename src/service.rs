//! The queue itself: submission, dequeue and the task state machine.
//!
//! Every mutating operation runs as one immediate SQLite transaction.
//! Cascades (readiness after completion, cancellation after failure) walk
//! the graph with explicit worklists inside that same transaction, so a
//! cascade either lands completely or not at all.

use crate::config::{Config, LimitsConfig};
use crate::db::{Database, deps, now_ms, stats, tasks};
use crate::error::{LimitKind, QueueError, Result};
use crate::priority::PriorityCalculator;
use crate::resolver::DependencyResolver;
use crate::types::{
    MAX_BASE_PRIORITY, NewTask, QueueStats, Task, TaskDependency, TaskFilter, TaskStatus,
    TaskTransition,
};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct TaskQueueService {
    db: Database,
    resolver: DependencyResolver,
    calculator: PriorityCalculator,
    limits: LimitsConfig,
}

impl TaskQueueService {
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            resolver: DependencyResolver::new(config.limits.cache_ttl()),
            calculator: PriorityCalculator::new(&config.priority)?,
            limits: config.limits.clone(),
        })
    }

    pub fn with_defaults(db: Database) -> Result<Self> {
        Self::new(db, &Config::default())
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn calculator(&self) -> &PriorityCalculator {
        &self.calculator
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Submit a task. It starts `Ready` when every prerequisite has already
    /// completed (trivially when there are none) and `Blocked` otherwise.
    pub fn enqueue_task(&self, request: NewTask) -> Result<Task> {
        if request.description.trim().is_empty() {
            return Err(QueueError::invalid_value("description", "must not be empty"));
        }
        if request.base_priority > MAX_BASE_PRIORITY {
            return Err(QueueError::invalid_value(
                "base_priority",
                format!("must be within 0-{MAX_BASE_PRIORITY}, got {}", request.base_priority),
            ));
        }

        let task_id = match request.id.as_deref() {
            Some(id) if id.trim().is_empty() => {
                return Err(QueueError::invalid_value("id", "must not be empty"));
            }
            Some(id) => id.to_string(),
            None => Uuid::now_v7().to_string(),
        };

        let mut seen = HashSet::new();
        let prerequisites: Vec<String> = request
            .prerequisites
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect();

        if prerequisites.len() > self.limits.max_dependencies_per_task {
            return Err(QueueError::limit_exceeded(
                &task_id,
                LimitKind::Dependencies,
                prerequisites.len() as u64,
                self.limits.max_dependencies_per_task as u64,
            ));
        }

        let task = self.write_graph(&task_id, |tx| {
            self.insert_new_task(tx, &task_id, &request, &prerequisites)
        })?;

        info!(
            task_id = %task.id,
            status = %task.status,
            priority = task.calculated_priority,
            prerequisites = prerequisites.len(),
            "Enqueued task"
        );
        Ok(task)
    }

    fn insert_new_task(
        &self,
        conn: &Connection,
        task_id: &str,
        request: &NewTask,
        prerequisites: &[String],
    ) -> Result<Task> {
        if tasks::task_exists(conn, task_id)? {
            return Err(QueueError::invalid_value(
                "id",
                format!("task {task_id} already exists"),
            ));
        }
        if let Some(parent) = &request.parent_task_id
            && !tasks::task_exists(conn, parent)?
        {
            return Err(QueueError::task_not_found(parent));
        }

        let mut completed = HashSet::new();
        let mut unfinished = Vec::new();
        for prerequisite in prerequisites {
            let prereq = tasks::get_task(conn, prerequisite)?
                .ok_or_else(|| QueueError::prerequisite_not_found(prerequisite))?;
            match prereq.status {
                TaskStatus::Failed | TaskStatus::Cancelled => {
                    return Err(QueueError::PrerequisiteUnsatisfiable {
                        task_id: prerequisite.clone(),
                        status: prereq.status,
                    });
                }
                TaskStatus::Completed => {
                    completed.insert(prerequisite.as_str());
                }
                _ => unfinished.push(prerequisite.clone()),
            }
            self.resolver
                .validate_new_dependency(conn, task_id, prerequisite)?;
        }

        let depth = self.resolver.depth_for_prerequisites(conn, prerequisites)?;
        if depth > self.limits.max_dependency_depth {
            return Err(QueueError::limit_exceeded(
                task_id,
                LimitKind::Depth,
                u64::from(depth),
                u64::from(self.limits.max_dependency_depth),
            ));
        }

        let now = now_ms();
        let mut task = Task {
            id: task_id.to_string(),
            description: request.description.clone(),
            status: TaskStatus::Pending,
            source: request.source,
            dependency_type: request.dependency_type,
            base_priority: request.base_priority,
            calculated_priority: 0.0,
            deadline: request.deadline,
            estimated_duration_seconds: request.estimated_duration_seconds,
            dependency_depth: depth,
            parent_task_id: request.parent_task_id.clone(),
            submitted_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        };
        task.calculated_priority = self.calculator.calculate(&task, 0);
        tasks::insert_task(conn, &task)?;

        for prerequisite in prerequisites {
            let resolved_at = completed.contains(prerequisite.as_str()).then_some(now);
            deps::insert_task_dependency(
                conn,
                &TaskDependency {
                    dependent_task_id: task_id.to_string(),
                    prerequisite_task_id: prerequisite.clone(),
                    dependency_type: request.dependency_type,
                    created_at: now,
                    resolved_at,
                },
            )?;
        }

        let initial = if unfinished.is_empty() {
            TaskStatus::Ready
        } else {
            TaskStatus::Blocked
        };
        tasks::update_task_status(conn, task_id, TaskStatus::Pending, initial, None)?;
        task.status = initial;

        // Each unfinished prerequisite now blocks one more task
        self.calculator
            .recalculate_priorities(conn, &self.resolver, &unfinished)?;

        Ok(task)
    }

    /// Claim the highest-priority ready task and mark it running. Ties go
    /// to the earliest submission.
    pub fn get_next_task(&self) -> Result<Option<Task>> {
        let task = self
            .db
            .transaction(TransactionBehavior::Immediate, |tx| tasks::claim_next_ready(tx))?;
        match &task {
            Some(task) => info!(
                task_id = %task.id,
                priority = task.calculated_priority,
                "Dequeued task"
            ),
            None => debug!("No ready task to dequeue"),
        }
        Ok(task)
    }

    /// Complete a running task. Returns the dependents that became ready.
    pub fn complete_task(&self, task_id: &str) -> Result<Vec<String>> {
        let newly_ready = self.write_graph(task_id, |tx| {
            let task = tasks::require_task(tx, task_id)?;
            require_running(&task, TaskStatus::Completed)?;
            tasks::update_task_status(tx, task_id, task.status, TaskStatus::Completed, None)?;

            let now = now_ms();
            let mut newly_ready = Vec::new();
            for dependent in self.resolver.get_blocked_tasks(tx, task_id)? {
                deps::resolve_dependency(tx, &dependent, task_id, now)?;
                if !self.resolver.are_all_dependencies_met(tx, &dependent)? {
                    continue;
                }
                let waiting = tasks::require_task(tx, &dependent)?;
                if waiting.status == TaskStatus::Blocked {
                    tasks::update_task_status(
                        tx,
                        &dependent,
                        TaskStatus::Blocked,
                        TaskStatus::Ready,
                        Some("prerequisites completed"),
                    )?;
                    newly_ready.push(dependent);
                }
            }

            self.calculator
                .recalculate_priorities(tx, &self.resolver, &newly_ready)?;
            Ok(newly_ready)
        })?;

        info!(task_id, unblocked = newly_ready.len(), "Completed task");
        Ok(newly_ready)
    }

    /// Fail a running task and cancel everything that transitively waits
    /// on it. Returns the cancelled ids.
    pub fn fail_task(&self, task_id: &str, error_message: &str) -> Result<Vec<String>> {
        let cancelled = self.write_graph(task_id, |tx| {
            let task = tasks::require_task(tx, task_id)?;
            require_running(&task, TaskStatus::Failed)?;
            tasks::update_task_status(
                tx,
                task_id,
                task.status,
                TaskStatus::Failed,
                Some(error_message),
            )?;
            tasks::set_error_message(tx, task_id, error_message)?;

            let reason = format!("prerequisite {task_id} failed");
            self.cancel_dependents(tx, task_id, &reason)
        })?;

        warn!(
            task_id,
            error = error_message,
            cancelled = cancelled.len(),
            "Task failed"
        );
        Ok(cancelled)
    }

    /// Cancel a task in any non-terminal state, along with everything that
    /// transitively waits on it. The returned ids start with `task_id`.
    pub fn cancel_task(&self, task_id: &str) -> Result<Vec<String>> {
        let cancelled = self.write_graph(task_id, |tx| {
            let task = tasks::require_task(tx, task_id)?;
            tasks::update_task_status(
                tx,
                task_id,
                task.status,
                TaskStatus::Cancelled,
                Some("cancelled"),
            )?;

            let reason = format!("prerequisite {task_id} cancelled");
            let mut cancelled = vec![task_id.to_string()];
            cancelled.extend(self.cancel_dependents(tx, task_id, &reason)?);
            self.rescore_prerequisites(tx, task_id)?;
            Ok(cancelled)
        })?;

        info!(task_id, cancelled = cancelled.len(), "Cancelled task");
        Ok(cancelled)
    }

    // Breadth-first over direct dependents read from the store, so edges
    // whose dependent row has vanished are reported instead of aborting.
    fn cancel_dependents(
        &self,
        conn: &Connection,
        root: &str,
        reason: &str,
    ) -> Result<Vec<String>> {
        let mut cancelled = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut worklist: VecDeque<String> = self.resolver.get_dependents(conn, root)?.into();

        while let Some(task_id) = worklist.pop_front() {
            if !visited.insert(task_id.clone()) {
                continue;
            }
            let Some(task) = tasks::get_task(conn, &task_id)? else {
                warn!(task_id = %task_id, root, "Skipping missing dependent during cascade");
                continue;
            };
            if !task.status.is_terminal() {
                tasks::update_task_status(
                    conn,
                    &task_id,
                    task.status,
                    TaskStatus::Cancelled,
                    Some(reason),
                )?;
                debug!(task_id = %task_id, root, "Cascade cancelled dependent");
                cancelled.push(task_id.clone());
            }
            worklist.extend(self.resolver.get_dependents(conn, &task_id)?);
        }

        for task_id in &cancelled {
            self.rescore_prerequisites(conn, task_id)?;
        }
        Ok(cancelled)
    }

    // A task leaving the active set no longer blocks its prerequisites
    fn rescore_prerequisites(&self, conn: &Connection, task_id: &str) -> Result<()> {
        let mut active = Vec::new();
        for edge in deps::get_task_dependencies(conn, task_id)? {
            if let Some(prereq) = tasks::get_task(conn, &edge.prerequisite_task_id)?
                && !prereq.status.is_terminal()
            {
                active.push(prereq.id);
            }
        }
        self.calculator
            .recalculate_priorities(conn, &self.resolver, &active)?;
        Ok(())
    }

    pub fn get_queue_status(&self) -> Result<QueueStats> {
        self.db.with_conn(stats::queue_stats)
    }

    /// Batches of `task_ids` in dependency order; see
    /// [`DependencyResolver::get_execution_order`].
    pub fn get_task_execution_plan(&self, task_ids: &[String]) -> Result<Vec<Vec<String>>> {
        self.db
            .with_conn(|conn| self.resolver.get_execution_order(conn, task_ids))
    }

    /// Make `dependent` wait on `prerequisite` after both were submitted.
    ///
    /// Depths of the dependent and everything downstream of it are
    /// recomputed; the edge is refused if any of them would exceed the
    /// depth limit. A ready dependent goes back to blocked while the new
    /// prerequisite is unfinished. Adding an existing edge changes nothing.
    pub fn add_dependency(&self, dependent: &str, prerequisite: &str) -> Result<Task> {
        let (task, inserted) = self.write_graph(dependent, |tx| {
            self.link_tasks(tx, dependent, prerequisite)
        })?;

        if inserted {
            info!(
                task_id = dependent,
                prerequisite,
                status = %task.status,
                "Added dependency"
            );
        }
        Ok(task)
    }

    fn link_tasks(
        &self,
        conn: &Connection,
        dependent: &str,
        prerequisite: &str,
    ) -> Result<(Task, bool)> {
        let task = tasks::require_task(conn, dependent)?;
        if !matches!(
            task.status,
            TaskStatus::Pending | TaskStatus::Blocked | TaskStatus::Ready
        ) {
            return Err(QueueError::invalid_transition(
                dependent,
                task.status,
                TaskStatus::Blocked,
            ));
        }

        let prereq = tasks::get_task(conn, prerequisite)?
            .ok_or_else(|| QueueError::prerequisite_not_found(prerequisite))?;
        if matches!(prereq.status, TaskStatus::Failed | TaskStatus::Cancelled) {
            return Err(QueueError::PrerequisiteUnsatisfiable {
                task_id: prerequisite.to_string(),
                status: prereq.status,
            });
        }

        let existing = deps::get_task_dependencies(conn, dependent)?;
        if existing
            .iter()
            .any(|edge| edge.prerequisite_task_id == prerequisite)
        {
            return Ok((task, false));
        }
        if existing.len() >= self.limits.max_dependencies_per_task {
            return Err(QueueError::limit_exceeded(
                dependent,
                LimitKind::Dependencies,
                existing.len() as u64 + 1,
                self.limits.max_dependencies_per_task as u64,
            ));
        }

        // Reload the edge set under the write lock before checking for cycles
        self.resolver.invalidate(dependent);
        self.resolver
            .validate_new_dependency(conn, dependent, prerequisite)?;

        let now = now_ms();
        let resolved = prereq.status == TaskStatus::Completed;
        deps::insert_task_dependency(
            conn,
            &TaskDependency {
                dependent_task_id: dependent.to_string(),
                prerequisite_task_id: prerequisite.to_string(),
                dependency_type: task.dependency_type,
                created_at: now,
                resolved_at: resolved.then_some(now),
            },
        )?;
        self.resolver.invalidate(dependent);

        let mut touched = vec![dependent.to_string(), prerequisite.to_string()];
        let mut lineage = vec![dependent.to_string()];
        lineage.extend(self.resolver.transitive_dependents(conn, dependent)?);
        for task_id in &lineage {
            let depth = self.resolver.calculate_dependency_depth(conn, task_id)?;
            if depth > self.limits.max_dependency_depth {
                return Err(QueueError::limit_exceeded(
                    task_id,
                    LimitKind::Depth,
                    u64::from(depth),
                    u64::from(self.limits.max_dependency_depth),
                ));
            }
            tasks::update_depth(conn, task_id, depth)?;
            if !touched.contains(task_id) {
                touched.push(task_id.clone());
            }
        }

        if !resolved && task.status == TaskStatus::Ready {
            let reason = format!("waiting on {prerequisite}");
            tasks::update_task_status(
                conn,
                dependent,
                TaskStatus::Ready,
                TaskStatus::Blocked,
                Some(&reason),
            )?;
        }

        self.calculator
            .recalculate_priorities(conn, &self.resolver, &touched)?;
        Ok((tasks::require_task(conn, dependent)?, true))
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task> {
        self.db
            .get_task(task_id)?
            .ok_or_else(|| QueueError::task_not_found(task_id))
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.db.list_tasks(filter)
    }

    /// Edges on which `task_id` waits, resolved or not.
    pub fn get_task_dependencies(&self, task_id: &str) -> Result<Vec<TaskDependency>> {
        self.db.with_conn(|conn| {
            tasks::require_task(conn, task_id)?;
            deps::get_task_dependencies(conn, task_id)
        })
    }

    pub fn get_child_tasks(&self, parent_task_id: &str) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| {
            tasks::require_task(conn, parent_task_id)?;
            tasks::list_tasks(
                conn,
                &TaskFilter {
                    parent_task_id: Some(parent_task_id.to_string()),
                    ..TaskFilter::default()
                },
            )
        })
    }

    pub fn get_task_history(&self, task_id: &str) -> Result<Vec<TaskTransition>> {
        self.db.with_conn(|conn| {
            tasks::require_task(conn, task_id)?;
            crate::db::state_transitions::get_task_history(conn, task_id)
        })
    }

    /// Rescore the given tasks. Missing ids are skipped with a warning.
    pub fn recalculate_priorities(&self, task_ids: &[String]) -> Result<Vec<(String, f64)>> {
        self.db.transaction(TransactionBehavior::Immediate, |tx| {
            self.calculator
                .recalculate_priorities(tx, &self.resolver, task_ids)
        })
    }

    /// Rescore every task that has not finished, so deadline urgency keeps
    /// pace with the clock.
    pub fn refresh_priorities(&self) -> Result<Vec<(String, f64)>> {
        let updated = self.db.transaction(TransactionBehavior::Immediate, |tx| {
            let active = tasks::active_task_ids(tx)?;
            self.calculator
                .recalculate_priorities(tx, &self.resolver, &active)
        })?;
        info!(rescored = updated.len(), "Refreshed priorities");
        Ok(updated)
    }

    /// Run `f` in an immediate transaction that touches edges around
    /// `task_id`. Cached graph state is dropped while the write lock is
    /// still held, whether the transaction commits or rolls back.
    fn write_graph<T>(
        &self,
        task_id: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        self.db.transaction(TransactionBehavior::Immediate, |tx| {
            let result = f(tx);
            self.resolver.invalidate(task_id);
            result
        })
    }
}

fn require_running(task: &Task, to: TaskStatus) -> Result<()> {
    if task.status == TaskStatus::Running {
        Ok(())
    } else {
        Err(QueueError::invalid_transition(&task.id, task.status, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskSource;

    fn service() -> TaskQueueService {
        TaskQueueService::with_defaults(Database::open_in_memory().unwrap()).unwrap()
    }

    fn enqueue(service: &TaskQueueService, id: &str, prerequisites: &[&str]) -> Task {
        service
            .enqueue_task(
                NewTask::new(format!("task {id}"))
                    .with_id(id)
                    .with_prerequisites(prerequisites.iter().copied()),
            )
            .unwrap()
    }

    fn status(service: &TaskQueueService, id: &str) -> TaskStatus {
        service.get_task(id).unwrap().status
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaskQueueService>();
    }

    #[test]
    fn root_task_is_ready_and_scored() {
        let service = service();
        let task = enqueue(&service, "a", &[]);

        assert_eq!(task.status, TaskStatus::Ready);
        assert_eq!(task.dependency_depth, 0);
        assert!((task.calculated_priority - 32.5).abs() < 1e-9);
        assert_eq!(service.get_task("a").unwrap(), task);
    }

    #[test]
    fn dependent_starts_blocked_one_level_deeper() {
        let service = service();
        enqueue(&service, "a", &[]);
        let b = enqueue(&service, "b", &["a"]);

        assert_eq!(b.status, TaskStatus::Blocked);
        assert_eq!(b.dependency_depth, 1);
    }

    #[test]
    fn duplicate_prerequisites_are_collapsed() {
        let service = service();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a", "a"]);

        assert_eq!(service.get_task_dependencies("b").unwrap().len(), 1);
    }

    #[test]
    fn invalid_input_is_rejected_before_storage() {
        let service = service();
        let blank = service.enqueue_task(NewTask::new("   ")).unwrap_err();
        assert!(matches!(blank, QueueError::InvalidInput { ref field, .. } if field == "description"));

        let too_high = service
            .enqueue_task(NewTask::new("x").with_priority(11))
            .unwrap_err();
        assert!(matches!(too_high, QueueError::InvalidInput { ref field, .. } if field == "base_priority"));

        assert_eq!(service.get_queue_status().unwrap().total_tasks, 0);
    }

    #[test]
    fn out_of_range_deadline_scores_as_overdue() {
        let service = service();
        let task = service
            .enqueue_task(NewTask::new("ancient").with_deadline(i64::MIN))
            .unwrap();

        let factors = service
            .calculator()
            .factors(&task, 0, task.submitted_at);
        assert_eq!(factors.urgency, 100.0);
        assert!(task.calculated_priority <= 100.0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let service = service();
        enqueue(&service, "a", &[]);
        let err = service
            .enqueue_task(NewTask::new("again").with_id("a"))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput { ref field, .. } if field == "id"));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let service = service();
        let err = service
            .enqueue_task(NewTask::new("child").with_parent("nobody"))
            .unwrap_err();
        assert!(matches!(err, QueueError::TaskNotFound { .. }));
    }

    #[test]
    fn enqueue_rescores_prerequisite_for_new_blocker() {
        let service = service();
        let before = enqueue(&service, "a", &[]).calculated_priority;
        enqueue(&service, "b", &["a"]);

        let after = service.get_task("a").unwrap().calculated_priority;
        assert!(after > before, "{after} should exceed {before}");
    }

    #[test]
    fn complete_requires_running() {
        let service = service();
        enqueue(&service, "a", &[]);

        let err = service.complete_task("a").unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                from: TaskStatus::Ready,
                to: TaskStatus::Completed,
                ..
            }
        ));
        assert_eq!(status(&service, "a"), TaskStatus::Ready);
    }

    #[test]
    fn cancel_of_running_task_relabels_it() {
        let service = service();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        service.get_next_task().unwrap();

        let cancelled = service.cancel_task("a").unwrap();

        assert_eq!(cancelled, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(status(&service, "a"), TaskStatus::Cancelled);
        assert_eq!(status(&service, "b"), TaskStatus::Cancelled);
    }

    #[test]
    fn fail_records_error_message() {
        let service = service();
        enqueue(&service, "a", &[]);
        service.get_next_task().unwrap();

        service.fail_task("a", "disk full").unwrap();

        let task = service.get_task("a").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("disk full"));
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn add_dependency_blocks_ready_task_and_deepens_lineage() {
        let service = service();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &[]);
        enqueue(&service, "c", &["b"]);

        let b = service.add_dependency("b", "a").unwrap();

        assert_eq!(b.status, TaskStatus::Blocked);
        assert_eq!(b.dependency_depth, 1);
        assert_eq!(service.get_task("c").unwrap().dependency_depth, 2);
    }

    #[test]
    fn add_dependency_rejects_cycle_without_side_effects() {
        let service = service();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);

        let err = service.add_dependency("a", "b").unwrap_err();

        assert!(matches!(err, QueueError::CircularDependency { .. }));
        assert_eq!(status(&service, "a"), TaskStatus::Ready);
        assert!(service.get_task_dependencies("a").unwrap().is_empty());
    }

    #[test]
    fn add_existing_dependency_is_a_no_op() {
        let service = service();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);

        service.add_dependency("b", "a").unwrap();

        assert_eq!(service.get_task_dependencies("b").unwrap().len(), 1);
    }

    #[test]
    fn child_tasks_are_listed_by_parent() {
        let service = service();
        enqueue(&service, "epic", &[]);
        service
            .enqueue_task(NewTask::new("one").with_id("c1").with_parent("epic"))
            .unwrap();
        service
            .enqueue_task(
                NewTask::new("two")
                    .with_id("c2")
                    .with_parent("epic")
                    .with_source(TaskSource::AgentPlanner),
            )
            .unwrap();

        let children: Vec<String> = service
            .get_child_tasks("epic")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(children, vec!["c1".to_string(), "c2".to_string()]);
    }
}
