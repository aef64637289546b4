//! Agent Task Queue
//!
//! A dependency-aware, priority-ordered task queue for coordinating
//! autonomous agents, backed by SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod priority;
pub mod resolver;
pub mod service;
pub mod types;

pub use service::TaskQueueService;
