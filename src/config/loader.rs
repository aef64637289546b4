//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/task-queue/)
    Project = 1,
    /// User-level config (~/.task-queue/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file tier lives.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit config file; when set, the project and user tiers are skipped.
    pub explicit: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let explicit = std::env::var_os("TASK_QUEUE_CONFIG_PATH").map(PathBuf::from);

        let project_dir = std::env::var_os("TASK_QUEUE_PROJECT_DIR")
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-queue")));

        let user_dir = std::env::var_os("TASK_QUEUE_USER_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-queue")));

        Self {
            explicit,
            project_dir,
            user_dir,
        }
    }

    /// Use a specific file instead of the discovered tiers.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all discovered tiers.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(&ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: &ConfigPaths) -> Result<Self> {
        let defaults = serde_json::to_value(Config::default())?;
        let mut layers = vec![defaults];
        let mut sources = Vec::new();

        let file_tiers: Vec<(ConfigTier, PathBuf)> = match &paths.explicit {
            // An explicit file must exist
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                vec![(ConfigTier::Project, path.clone())]
            }
            None => [
                (ConfigTier::Project, paths.project_dir.as_ref()),
                (ConfigTier::User, paths.user_dir.as_ref()),
            ]
            .into_iter()
            .filter_map(|(tier, dir)| dir.map(|d| (tier, d.join(CONFIG_FILE))))
            .filter(|(_, file)| file.is_file())
            .collect(),
        };

        for (tier, file) in file_tiers {
            layers.push(read_yaml(&file)?);
            debug!(tier = %tier, path = %file.display(), "Loaded config file");
            sources.push((tier, file));
        }

        let merged = deep_merge_all(layers);
        let mut config: Config =
            serde_json::from_value(merged).context("invalid merged configuration")?;
        apply_env_overrides(&mut config)?;

        Ok(Self { config, sources })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Files that contributed to the configuration, lowest tier first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw}: {e}")),
        Err(_) => Ok(None),
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(db_path) = std::env::var_os("TASK_QUEUE_DB_PATH") {
        config.server.db_path = PathBuf::from(db_path);
    }
    if let Some(max) = env_parse("TASK_QUEUE_MAX_DEPENDENCIES")? {
        config.limits.max_dependencies_per_task = max;
    }
    if let Some(max) = env_parse("TASK_QUEUE_MAX_DEPTH")? {
        config.limits.max_dependency_depth = max;
    }
    if let Some(ttl) = env_parse("TASK_QUEUE_CACHE_TTL")? {
        config.limits.cache_ttl_seconds = ttl;
    }
    Ok(())
}
