//! Configuration file and runtime settings.
//!
//! The config file is optional TOML:
//!
//! ```toml
//! subscription_id = "00000000-0000-0000-0000-000000000000"
//! api_base = "https://management.azure.com"
//! jobs = 8
//! timeout_secs = 600
//! backup_dir = "~/tag-backups"
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 250
//! ```
//!
//! Command-line flags and environment variables win over file values.

use crate::cli::GlobalArgs;
use crate::paths;
use anyhow::{Context, Result, ensure};
use armkit::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding a bearer token for the management API.
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub subscription_id: Option<String>,
    pub api_base: Option<String>,
    pub access_token: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub backup_dir: Option<String>,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    /// Fails when `backoff_factor` is negative or not finite.
    pub fn to_retry_config(&self) -> Result<RetryConfig> {
        ensure!(
            self.backoff_factor.is_finite() && self.backoff_factor >= 0.0,
            "retry.backoff_factor must be a finite, non-negative number (got {})",
            self.backoff_factor
        );

        Ok(RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        })
    }
}

impl Config {
    /// Load `path`, or the default config file when `None`.
    ///
    /// A missing default file yields the default config; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !explicit && !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Where resources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Azure Resource Manager.
    Arm {
        subscription_id: String,
        api_base: Option<String>,
        access_token: String,
    },
    /// A local inventory file, rewritten after mutating commands.
    Inventory(PathBuf),
}

/// Effective settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Source,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub retry: RetryConfig,
    pub backup_dir: PathBuf,
}

impl Settings {
    /// Merge command-line arguments over `config`.
    pub fn resolve(args: &GlobalArgs, config: Config) -> Result<Self> {
        let source = match &args.inventory {
            Some(path) => Source::Inventory(path.clone()),
            None => {
                let subscription_id = args
                    .subscription
                    .clone()
                    .or(config.subscription_id)
                    .context("No subscription configured (use --subscription or set subscription_id in the config file)")?;
                let access_token = std::env::var(ENV_ACCESS_TOKEN)
                    .ok()
                    .filter(|t| !t.is_empty())
                    .or(config.access_token)
                    .with_context(|| format!("No access token (set {ENV_ACCESS_TOKEN} or access_token in the config file)"))?;
                Source::Arm {
                    subscription_id,
                    api_base: config.api_base,
                    access_token,
                }
            }
        };

        let retry = config
            .retry
            .to_retry_config()
            .context("Invalid [retry] settings")?;

        let backup_dir = match config.backup_dir {
            Some(dir) => paths::expand(&dir),
            None => paths::backups_dir()?,
        };

        Ok(Self {
            source,
            jobs: args.jobs.or(config.jobs).unwrap_or(tagengine::scanner::DEFAULT_JOBS).max(1),
            timeout: args
                .timeout
                .or(config.timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            retry,
            backup_dir,
        })
    }
}
