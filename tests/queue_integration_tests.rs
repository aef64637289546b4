//! Integration tests for the task queue service.
//!
//! These tests drive `TaskQueueService` end to end against an in-memory
//! SQLite database. Tests are organized by behaviour.

use agent_task_queue::config::Config;
use agent_task_queue::db::{Database, tasks};
use agent_task_queue::error::{LimitKind, QueueError};
use agent_task_queue::service::TaskQueueService;
use agent_task_queue::types::{NewTask, TaskStatus};

/// Helper to create a service over a fresh in-memory database.
fn setup() -> TaskQueueService {
    setup_with(Config::default())
}

fn setup_with(config: Config) -> TaskQueueService {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    TaskQueueService::new(db, &config).expect("Failed to build service")
}

fn enqueue(service: &TaskQueueService, id: &str, prerequisites: &[&str]) {
    service
        .enqueue_task(
            NewTask::new(format!("task {id}"))
                .with_id(id)
                .with_prerequisites(prerequisites.iter().copied()),
        )
        .expect("Failed to enqueue task");
}

/// Move one specific ready task to running, bypassing dequeue order.
fn start(service: &TaskQueueService, id: &str) {
    service
        .db()
        .with_conn(|conn| {
            tasks::update_task_status(conn, id, TaskStatus::Ready, TaskStatus::Running, None)
        })
        .expect("Failed to start task");
}

fn run_to_completion(service: &TaskQueueService, id: &str) -> Vec<String> {
    start(service, id);
    service.complete_task(id).expect("Failed to complete task")
}

fn status(service: &TaskQueueService, id: &str) -> TaskStatus {
    service.get_task(id).expect("Task should exist").status
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// a <- b <- d, a <- c <- d
fn diamond(service: &TaskQueueService) {
    enqueue(service, "a", &[]);
    enqueue(service, "b", &["a"]);
    enqueue(service, "c", &["a"]);
    enqueue(service, "d", &["b", "c"]);
}

mod graph_tests {
    use super::*;

    #[test]
    fn closing_a_cycle_is_rejected_with_its_path() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        enqueue(&service, "c", &["b"]);

        let err = service.add_dependency("a", "c").unwrap_err();

        let QueueError::CircularDependency { path } = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(path, ids(&["a", "c", "b", "a"]));
        assert!(service.get_task_dependencies("a").unwrap().is_empty());
    }

    #[test]
    fn unknown_prerequisite_is_rejected() {
        let service = setup();
        let err = service
            .enqueue_task(NewTask::new("orphan").with_prerequisites(["ghost"]))
            .unwrap_err();

        assert!(matches!(err, QueueError::PrerequisiteNotFound { ref task_id } if task_id == "ghost"));
        assert_eq!(service.get_queue_status().unwrap().total_tasks, 0);
    }

    #[test]
    fn cancelled_prerequisite_is_unsatisfiable() {
        let service = setup();
        enqueue(&service, "a", &[]);
        service.cancel_task("a").unwrap();

        let err = service
            .enqueue_task(NewTask::new("late").with_prerequisites(["a"]))
            .unwrap_err();

        assert!(matches!(
            err,
            QueueError::PrerequisiteUnsatisfiable {
                status: TaskStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn completed_prerequisite_yields_ready_task_with_resolved_edge() {
        let service = setup();
        enqueue(&service, "a", &[]);
        run_to_completion(&service, "a");

        enqueue(&service, "b", &["a"]);

        assert_eq!(status(&service, "b"), TaskStatus::Ready);
        let edges = service.get_task_dependencies("b").unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_resolved());
    }

    #[test]
    fn prerequisite_limit_is_enforced() {
        let mut config = Config::default();
        config.limits.max_dependencies_per_task = 2;
        let service = setup_with(config);
        for id in ["a", "b", "c"] {
            enqueue(&service, id, &[]);
        }

        let err = service
            .enqueue_task(
                NewTask::new("fan-in")
                    .with_id("x")
                    .with_prerequisites(["a", "b", "c"]),
            )
            .unwrap_err();

        let QueueError::DependencyLimitExceeded {
            task_id,
            kind,
            actual,
            max,
        } = err
        else {
            panic!("expected a limit error, got {err:?}");
        };
        assert_eq!(task_id, "x");
        assert_eq!(kind, LimitKind::Dependencies);
        assert_eq!((actual, max), (3, 2));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut config = Config::default();
        config.limits.max_dependency_depth = 2;
        let service = setup_with(config);
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        enqueue(&service, "c", &["b"]);

        let err = service
            .enqueue_task(NewTask::new("too deep").with_prerequisites(["c"]))
            .unwrap_err();

        assert!(matches!(
            err,
            QueueError::DependencyLimitExceeded {
                kind: LimitKind::Depth,
                actual: 3,
                max: 2,
                ..
            }
        ));
    }

    #[test]
    fn linking_rejects_depth_overflow_downstream() {
        let mut config = Config::default();
        config.limits.max_dependency_depth = 2;
        let service = setup_with(config);
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        enqueue(&service, "x", &[]);
        enqueue(&service, "y", &["x"]);

        // y would sit at depth 3
        let err = service.add_dependency("x", "b").unwrap_err();

        assert!(matches!(
            err,
            QueueError::DependencyLimitExceeded { ref task_id, kind: LimitKind::Depth, .. }
                if task_id == "y"
        ));
        assert_eq!(service.get_task("x").unwrap().dependency_depth, 0);
        assert_eq!(status(&service, "x"), TaskStatus::Ready);
    }

    #[test]
    fn execution_plan_batches_diamond() {
        let service = setup();
        diamond(&service);

        let plan = service
            .get_task_execution_plan(&ids(&["d", "c", "b", "a"]))
            .unwrap();

        assert_eq!(
            plan,
            vec![ids(&["a"]), ids(&["c", "b"]), ids(&["d"])]
        );

        let plan = service
            .get_task_execution_plan(&ids(&["a", "b", "c", "d"]))
            .unwrap();
        assert_eq!(plan, vec![ids(&["a"]), ids(&["b", "c"]), ids(&["d"])]);
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn dependent_waits_for_every_prerequisite() {
        let service = setup();
        enqueue(&service, "b", &[]);
        enqueue(&service, "c", &[]);
        enqueue(&service, "d", &["b", "c"]);

        assert!(run_to_completion(&service, "b").is_empty());
        assert_eq!(status(&service, "d"), TaskStatus::Blocked);

        assert_eq!(run_to_completion(&service, "c"), ids(&["d"]));
        assert_eq!(status(&service, "d"), TaskStatus::Ready);
    }

    #[test]
    fn diamond_completes_in_waves() {
        let service = setup();
        diamond(&service);

        assert_eq!(run_to_completion(&service, "a"), ids(&["b", "c"]));
        assert_eq!(status(&service, "d"), TaskStatus::Blocked);
        assert!(run_to_completion(&service, "b").is_empty());
        assert_eq!(run_to_completion(&service, "c"), ids(&["d"]));

        let stats = service.get_queue_status().unwrap();
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.ready, 1);
    }

    #[test]
    fn failure_cancels_chain_but_not_sibling() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        enqueue(&service, "c", &["b"]);
        enqueue(&service, "f", &[]);
        start(&service, "a");

        let cancelled = service.fail_task("a", "compiler crashed").unwrap();

        assert_eq!(cancelled, ids(&["b", "c"]));
        assert_eq!(status(&service, "a"), TaskStatus::Failed);
        assert_eq!(status(&service, "c"), TaskStatus::Cancelled);
        assert_eq!(status(&service, "f"), TaskStatus::Ready);
    }

    #[test]
    fn mid_chain_failure_leaves_completed_upstream_alone() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        enqueue(&service, "c", &["b"]);
        enqueue(&service, "d", &["c"]);
        enqueue(&service, "e", &["d"]);
        enqueue(&service, "f", &[]);

        assert_eq!(run_to_completion(&service, "a"), ids(&["b"]));
        assert_eq!(run_to_completion(&service, "b"), ids(&["c"]));
        start(&service, "c");
        let cancelled = service.fail_task("c", "tests failed").unwrap();

        assert_eq!(cancelled, ids(&["d", "e"]));
        assert_eq!(status(&service, "a"), TaskStatus::Completed);
        assert_eq!(status(&service, "b"), TaskStatus::Completed);
        assert_eq!(status(&service, "c"), TaskStatus::Failed);
        assert_eq!(status(&service, "d"), TaskStatus::Cancelled);
        assert_eq!(status(&service, "e"), TaskStatus::Cancelled);
        assert_eq!(status(&service, "f"), TaskStatus::Ready);
        assert!(service.get_task("b").unwrap().error_message.is_none());
    }

    #[test]
    fn cancel_returns_itself_first() {
        let service = setup();
        diamond(&service);

        let cancelled = service.cancel_task("b").unwrap();

        assert_eq!(cancelled, ids(&["b", "d"]));
        assert_eq!(status(&service, "c"), TaskStatus::Blocked);
    }

    #[test]
    fn terminal_tasks_reject_further_transitions() {
        let service = setup();
        enqueue(&service, "a", &[]);
        run_to_completion(&service, "a");
        let history = service.get_task_history("a").unwrap().len();

        for err in [
            service.complete_task("a").unwrap_err(),
            service.fail_task("a", "late").unwrap_err(),
            service.cancel_task("a").unwrap_err(),
        ] {
            assert!(matches!(
                err,
                QueueError::InvalidTransition {
                    from: TaskStatus::Completed,
                    ..
                }
            ));
        }

        let task = service.get_task("a").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error_message.is_none());
        assert_eq!(service.get_task_history("a").unwrap().len(), history);
    }

    #[test]
    fn history_records_every_transition() {
        let service = setup();
        enqueue(&service, "a", &[]);
        run_to_completion(&service, "a");

        let history = service.get_task_history("a").unwrap();
        let steps: Vec<_> = history.iter().map(|t| (t.from_status, t.to_status)).collect();

        assert_eq!(
            steps,
            vec![
                (None, TaskStatus::Pending),
                (Some(TaskStatus::Pending), TaskStatus::Ready),
                (Some(TaskStatus::Ready), TaskStatus::Running),
                (Some(TaskStatus::Running), TaskStatus::Completed),
            ]
        );
    }

    #[test]
    fn cascade_skips_dependents_without_task_rows() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        service
            .db()
            .with_conn(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys=OFF;
                     INSERT INTO task_dependencies
                        (dependent_task_id, prerequisite_task_id, dependency_type, created_at)
                     VALUES ('ghost', 'a', 'sequential', 0);
                     PRAGMA foreign_keys=ON;",
                )?;
                Ok(())
            })
            .unwrap();
        start(&service, "a");

        let cancelled = service.fail_task("a", "boom").unwrap();

        assert_eq!(cancelled, ids(&["b"]));
    }

    #[test]
    fn completion_ignores_edges_without_task_rows() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);
        service
            .db()
            .with_conn(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys=OFF;
                     INSERT INTO task_dependencies
                        (dependent_task_id, prerequisite_task_id, dependency_type, created_at)
                     VALUES ('ghost', 'a', 'sequential', 0);
                     PRAGMA foreign_keys=ON;",
                )?;
                Ok(())
            })
            .unwrap();
        start(&service, "a");

        assert_eq!(service.complete_task("a").unwrap(), ids(&["b"]));
        assert_eq!(service.get_task("b").unwrap().status, TaskStatus::Ready);
    }
}

mod dequeue_tests {
    use super::*;

    #[test]
    fn higher_priority_first_then_submission_order() {
        let service = setup();
        for (id, priority) in [("first", 5), ("second", 5), ("urgent", 8)] {
            service
                .enqueue_task(NewTask::new(id).with_id(id).with_priority(priority))
                .unwrap();
        }

        let order: Vec<String> = std::iter::from_fn(|| service.get_next_task().unwrap())
            .map(|t| t.id)
            .collect();

        assert_eq!(order, ids(&["urgent", "first", "second"]));
    }

    #[test]
    fn blocked_tasks_are_never_dequeued() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &["a"]);

        let next = service.get_next_task().unwrap().unwrap();
        assert_eq!(next.id, "a");
        assert_eq!(next.status, TaskStatus::Running);
        assert!(next.started_at.is_some());
        assert!(service.get_next_task().unwrap().is_none());
    }
}

mod priority_tests {
    use super::*;
    use agent_task_queue::db::now_ms;
    use agent_task_queue::priority::PriorityWeights;

    #[test]
    fn scores_stay_within_bounds() {
        let service = setup();
        enqueue(&service, "hub", &[]);
        for i in 0..20 {
            enqueue(&service, &format!("leaf-{i}"), &["hub"]);
        }
        service
            .enqueue_task(
                NewTask::new("overdue")
                    .with_priority(10)
                    .with_deadline(now_ms() - 1_000),
            )
            .unwrap();
        service
            .enqueue_task(NewTask::new("idle").with_priority(0))
            .unwrap();

        for task in service.list_tasks(&Default::default()).unwrap() {
            assert!(
                (0.0..=100.0).contains(&task.calculated_priority),
                "{} scored {}",
                task.id,
                task.calculated_priority
            );
        }
    }

    #[test]
    fn invalid_weights_are_rejected_at_construction() {
        let mut config = Config::default();
        config.priority.weights = PriorityWeights {
            base: 0.5,
            ..PriorityWeights::default()
        };

        let err = TaskQueueService::new(Database::open_in_memory().unwrap(), &config)
            .err()
            .expect("weights summing to 1.2 should be rejected");
        assert!(matches!(err, QueueError::InvalidConfig(_)));
    }

    #[test]
    fn refresh_rescores_only_unfinished_tasks() {
        let service = setup();
        enqueue(&service, "a", &[]);
        enqueue(&service, "b", &[]);
        run_to_completion(&service, "a");

        let updated = service.refresh_priorities().unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, "b");
    }

    #[test]
    fn recalculation_skips_missing_tasks() {
        let service = setup();
        enqueue(&service, "a", &[]);

        let updated = service.recalculate_priorities(&ids(&["a", "gone"])).unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, "a");
    }
}
