//! Configuration management.
//!
//! Two files are involved at runtime:
//!
//! - `botfleet.toml` (this module): operator settings for supervisor
//!   cadence, payload limits, filesystem paths and logging. Loaded once at
//!   startup; [`Config::create_default`] writes a starter file for
//!   `botfleet init`.
//! - `bot_config.json`: the persisted session roster, owned by the
//!   registry (`bot::registry`), not by this module.
//!
//! Deployment mode is not a config key: it is derived from the process
//! environment so the same config file works locally and on the platform.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Paths and identity of the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// JSON roster of persisted sessions.
    pub roster_file: String,
    /// Root directory for per-session backend credentials.
    pub auth_dir: String,
    /// Keyword that aborts an in-progress dialog at any step.
    #[serde(default = "default_cancel_keyword")]
    pub cancel_keyword: String,
    /// Maximum media payload accepted on the broadcast fallback path.
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: usize,
}

fn default_cancel_keyword() -> String {
    "batal".to_string()
}

fn default_max_media_bytes() -> usize {
    15 * 1024 * 1024
}

/// Cadence of the supervisor's periodic actions, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub health_interval_secs: u64,
    pub keepalive_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    /// How long the process may run with zero ready sessions before the
    /// supervisor gives up and asks for an external restart.
    pub ready_grace_secs: u64,
    /// RSS threshold for the health report's high-memory warning.
    #[serde(default = "default_memory_warn_mib")]
    pub memory_warn_mib: u64,
}

fn default_memory_warn_mib() -> u64 {
    400
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: 120,
            keepalive_interval_secs: 300,
            cleanup_interval_secs: 600,
            ready_grace_secs: 600,
            memory_warn_mib: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub manager: ManagerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manager: ManagerConfig {
                roster_file: "./bot_config.json".to_string(),
                auth_dir: "./.auth".to_string(),
                cancel_keyword: default_cancel_keyword(),
                max_media_bytes: default_max_media_bytes(),
            },
            supervisor: SupervisorConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("botfleet.log".to_string()),
            },
        }
    }
}

/// How the process was deployed, derived from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Platform-managed run: no terminal, auto-provisioning, tight QR
    /// budget, restarts handled by the external process manager.
    Unattended,
    /// Operator at a terminal with the interactive menu.
    Interactive,
}

impl DeployMode {
    /// Detect the mode from the Railway environment variables the platform
    /// injects. Any of them present means unattended.
    pub fn detect() -> Self {
        let railway = std::env::var("RAILWAY_ENVIRONMENT")
            .map(|v| v == "production")
            .unwrap_or(false)
            || std::env::var("RAILWAY_PROJECT_ID").is_ok()
            || std::env::var("RAILWAY_STATIC_URL").is_ok();
        if railway {
            DeployMode::Unattended
        } else {
            DeployMode::Interactive
        }
    }

    pub fn is_unattended(&self) -> bool {
        matches!(self, DeployMode::Unattended)
    }

    /// Pairing-code retry budget: unattended deployments fail fast so the
    /// platform restarts the process instead of waiting on a dead QR.
    pub fn qr_max_retries(&self) -> u32 {
        match self {
            DeployMode::Unattended => 1,
            DeployMode::Interactive => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeployMode::Unattended => "Railway",
            DeployMode::Interactive => "Local",
        }
    }
}
