//! Agent Task Queue CLI
//!
//! Operator front end for the dependency-aware task queue. Results and
//! errors are printed as JSON on stdout.

use agent_task_queue::cli::{Cli, Command, EnqueueArgs, ListArgs};
use agent_task_queue::config::{ConfigLoader, ConfigPaths};
use agent_task_queue::db::Database;
use agent_task_queue::error::{ErrorResponse, QueueError};
use agent_task_queue::logging::{self, LogTarget};
use agent_task_queue::service::TaskQueueService;
use agent_task_queue::types::{NewTask, TaskFilter};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(&LogTarget::parse(&cli.log), cli.verbose) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut paths = ConfigPaths::discover();
    if let Some(config_path) = &cli.config {
        paths = paths.with_explicit(config_path);
    }
    let mut loader = ConfigLoader::load_with_paths(&paths)
        .map_err(|e| QueueError::InvalidConfig(format!("{e:#}")))?;
    for (tier, path) in loader.sources() {
        debug!(tier = %tier, path = %path.display(), "Config source");
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    config
        .ensure_db_dir()
        .context("failed to create database directory")?;

    let db = Database::open(&config.server.db_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.server.db_path.display()
        )
    })?;
    info!(db_path = %config.server.db_path.display(), "Task queue ready");

    let service = TaskQueueService::new(db, config)?;
    dispatch(&service, cli.command)
}

fn dispatch(service: &TaskQueueService, command: Command) -> Result<()> {
    match command {
        Command::Enqueue(args) => print_json(&service.enqueue_task(new_task(args))?),
        Command::Next => print_json(&service.get_next_task()?),
        Command::Complete { id } => {
            let ready = service.complete_task(&id)?;
            print_json(&json!({ "task_id": id, "ready": ready }))
        }
        Command::Fail { id, error } => {
            let cancelled = service.fail_task(&id, &error)?;
            print_json(&json!({ "task_id": id, "cancelled": cancelled }))
        }
        Command::Cancel { id } => print_json(&json!({
            "cancelled": service.cancel_task(&id)?,
        })),
        Command::Status => print_json(&service.get_queue_status()?),
        Command::Plan { ids } => print_json(&service.get_task_execution_plan(&ids)?),
        Command::Show { id } => print_json(&json!({
            "task": service.get_task(&id)?,
            "dependencies": service.get_task_dependencies(&id)?,
            "children": service.get_child_tasks(&id)?,
        })),
        Command::List(ListArgs {
            status,
            parent,
            limit,
        }) => print_json(&service.list_tasks(&TaskFilter {
            status,
            parent_task_id: parent,
            limit,
        })?),
        Command::History { id } => print_json(&service.get_task_history(&id)?),
        Command::Link {
            dependent,
            prerequisite,
        } => print_json(&service.add_dependency(&dependent, &prerequisite)?),
        Command::Recalc { ids } => {
            let updated = if ids.is_empty() {
                service.refresh_priorities()?
            } else {
                service.recalculate_priorities(&ids)?
            };
            let updated: Vec<_> = updated
                .into_iter()
                .map(|(task_id, priority)| json!({ "task_id": task_id, "priority": priority }))
                .collect();
            print_json(&updated)
        }
    }
}

fn new_task(args: EnqueueArgs) -> NewTask {
    let mut task = NewTask::new(args.description)
        .with_prerequisites(args.after)
        .with_priority(args.priority)
        .with_source(args.source)
        .with_dependency_type(args.dependency_type);
    if let Some(id) = args.id {
        task = task.with_id(id);
    }
    if let Some(deadline) = args.deadline {
        task = task.with_deadline(deadline);
    }
    if let Some(seconds) = args.estimate {
        task = task.with_estimated_duration(seconds);
    }
    if let Some(parent) = args.parent {
        task = task.with_parent(parent);
    }
    task
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match serde_json::to_string_pretty(&ErrorResponse::from(err)) {
        Ok(body) => println!("{body}"),
        Err(_) => eprintln!("{err:#}"),
    }
}
