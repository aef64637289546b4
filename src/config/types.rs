//! Configuration types.

use crate::priority::PriorityWeights;
use crate::resolver::DEFAULT_CACHE_TTL;
use crate::types::TaskSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub priority: PriorityConfig,
}

impl Config {
    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-queue/tasks.db")
}

/// Graph limits and resolver cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum prerequisites on one task.
    #[serde(default = "default_max_dependencies")]
    pub max_dependencies_per_task: usize,

    /// Maximum length of a prerequisite chain.
    #[serde(default = "default_max_depth")]
    pub max_dependency_depth: u32,

    /// Lifetime of the resolver's graph snapshot.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

impl LimitsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dependencies_per_task: default_max_dependencies(),
            max_dependency_depth: default_max_depth(),
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_max_dependencies() -> usize {
    50
}

fn default_max_depth() -> u32 {
    10
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

/// Priority scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub weights: PriorityWeights,

    /// Urgency a deadline decays toward as it recedes.
    #[serde(default = "default_urgency_floor")]
    pub urgency_floor: f64,

    /// Slack (seconds) over which urgency falls by a factor of e.
    #[serde(default = "default_urgency_horizon")]
    pub urgency_horizon_seconds: f64,

    /// Score per submitting source. Sources left out score 0.
    #[serde(default = "default_source_scores")]
    pub source_scores: BTreeMap<TaskSource, f64>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            weights: PriorityWeights::default(),
            urgency_floor: default_urgency_floor(),
            urgency_horizon_seconds: default_urgency_horizon(),
            source_scores: default_source_scores(),
        }
    }
}

fn default_urgency_floor() -> f64 {
    10.0
}

fn default_urgency_horizon() -> f64 {
    86_400.0 // one day
}

fn default_source_scores() -> BTreeMap<TaskSource, f64> {
    BTreeMap::from([
        (TaskSource::Human, 100.0),
        (TaskSource::AgentRequirements, 75.0),
        (TaskSource::AgentPlanner, 50.0),
        (TaskSource::AgentImplementation, 25.0),
    ])
}
