//! Configuration loading.
//!
//! Loaded from an explicit path, `.taskq.yml` in the current directory, or
//! `~/.config/taskq/taskq.yml`, falling back to defaults.

use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use taskq::executor::ExecutorConfig;
use taskq::limiter::RateLimiterConfig;
use taskq::queue::{DEFAULT_CONTEXT_FILE, DEFAULT_MAX_PARALLEL};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue settings.
    pub queue: QueueConfig,

    /// Rate limiter settings.
    pub rate_limit: RateLimiterConfig,

    /// Executor settings.
    pub executor: ExecutorConfig,
}

/// Queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Path of the persisted queue file.
    pub file: PathBuf,

    /// Maximum number of tasks processed in parallel.
    pub max_parallel: usize,

    /// Context file handed to every execution ahead of task context paths.
    pub default_context: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("task_queue.json"),
            max_parallel: DEFAULT_MAX_PARALLEL,
            default_context: DEFAULT_CONTEXT_FILE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .taskq.yml in current directory
    /// 3. ~/.config/taskq/taskq.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project config
        let project_config = PathBuf::from(".taskq.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .taskq.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .taskq.yml: {}", e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskq").join("taskq.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
