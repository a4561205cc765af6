//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Bank credentials are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{Credentials, SaldoError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub bank: BankConfig,
    pub schedule: ScheduleConfig,
    pub export: ExportConfig,
    pub prediction: PredictionConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BankConfig {
    /// Used with the startup credentials. Begin events carry their own URL.
    pub api_url: Option<String>,
    pub username_env: Option<String>,
    pub password_env: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64,
    pub prediction_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictionConfig {
    pub enabled: bool,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_script_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_script_timeout_secs() -> u64 {
    600
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string and check its values.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let problem = if self.schedule.poll_interval_secs == 0 {
            "schedule.poll_interval_secs must be greater than zero"
        } else if self.schedule.prediction_interval_secs == 0 {
            "schedule.prediction_interval_secs must be greater than zero"
        } else if self.prediction.enabled && self.prediction.program.trim().is_empty() {
            "prediction.program must be set when prediction is enabled"
        } else {
            return Ok(());
        };
        Err(SaldoError::Config(problem.to_string()).into())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }

    pub fn prediction_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.prediction_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.bank.request_timeout_secs)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Credentials to seed the session with at startup, if fully configured.
    ///
    /// Returns `None` when any of URL, username or password is missing; the
    /// session then waits for a `GET_AUTH_TICKET` from the display side.
    pub fn startup_credentials(&self) -> Option<Credentials> {
        let api_url = self.bank.api_url.clone()?;
        let username = Self::resolve_env(self.bank.username_env.as_deref()?).ok()?;
        let password = Self::resolve_env(self.bank.password_env.as_deref()?).ok()?;
        Some(Credentials::new(username, password, api_url))
    }
}
