use crate::job::JobSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Daemon configuration for `logshipd`: the jobs to start at boot and the
/// shutdown join timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub patterns: Vec<String>,
    pub destination: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub create_dest_dirs: bool,
    #[serde(default)]
    pub preserve_structure: bool,
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl JobConfig {
    pub fn into_spec(self) -> JobSpec {
        let mut spec = JobSpec::new(self.name, self.patterns, self.destination);
        spec.interval = Duration::from_secs(self.interval_secs);
        spec.create_dest_dirs = self.create_dest_dirs;
        spec.preserve_structure = self.preserve_structure;
        spec.root_dir = self.root_dir;
        spec.max_retries = self.max_retries;
        spec.retry_delay = Duration::from_secs(self.retry_delay_secs);
        spec
    }
}

impl Config {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Load from `LOGSHIP_CONFIG_PATH` (default `/etc/logship/config.toml`).
    /// A missing file falls back to the defaults with a warning; a file that
    /// exists but does not parse is an error.
    pub async fn load() -> Result<Self> {
        let config_path = std::env::var("LOGSHIP_CONFIG_PATH")
            .unwrap_or_else(|_| "/etc/logship/config.toml".to_string());

        match tokio::fs::read_to_string(&config_path).await {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                Ok(config)
            }
            Err(_) => {
                warn!("configuration file not found at {config_path}; using default settings");
                Ok(Config::default())
            }
        }
    }
}

fn default_stop_timeout_secs() -> u64 {
    60
}

fn default_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}
