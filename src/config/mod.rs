//! Configuration for the task queue.
//!
//! Consolidates configuration from several tiers with field-by-field YAML merging:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/task-queue/config.yaml`
//! 3. **User** - `~/.task-queue/config.yaml`
//! 4. **Environment** - the variables below
//!
//! ## Environment Variables
//! - `TASK_QUEUE_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `TASK_QUEUE_DB_PATH` - Database path
//! - `TASK_QUEUE_MAX_DEPENDENCIES` - Prerequisite limit per task
//! - `TASK_QUEUE_MAX_DEPTH` - Dependency depth limit
//! - `TASK_QUEUE_CACHE_TTL` - Graph cache lifetime in seconds
//! - `TASK_QUEUE_USER_DIR` - User config dir (default: `~/.task-queue`)
//! - `TASK_QUEUE_PROJECT_DIR` - Project config dir (default: `./task-queue`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
