//! Runtime configuration loaded from YAML, with environment overrides.
//!
//! Secrets never live in the file: the advisor API key is read from the
//! environment variable named by `advisor.api_key_env`.

use serde::{Deserialize, Serialize};
use sim_ai::{HttpTransport, ResilientClient, RetryPolicy};
use sim_core::{default_catalog, validate_catalog, GameEventDefinition, StartingConditions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `advisor.endpoint`.
pub const ENDPOINT_ENV: &str = "FINANCITY_ADVISOR_ENDPOINT";
/// Environment variable that overrides `accounts.base_url`.
pub const ACCOUNTS_URL_ENV: &str = "FINANCITY_ACCOUNTS_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid yaml: {0}")]
    Yaml(String),
    #[error("invalid config: {0}")]
    Invalid(#[from] sim_core::ValidationError),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("advisor endpoint is set but {0} is not")]
    MissingApiKey(String),
    #[error("advisor transport: {0}")]
    Transport(#[from] sim_ai::TransportError),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub game: GameConfig,
    pub timers: TimerConfig,
    pub advisor: AdvisorConfig,
    pub accounts: AccountsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub start: StartingConditions,
    /// Fixed seed for reproducible sessions; entropy when absent.
    pub rng_seed: Option<u64>,
    /// Chart points generated before the first investment.
    pub history_days: u32,
    /// Replaces the built-in event catalog when present.
    pub events: Option<Vec<GameEventDefinition>>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start: StartingConditions::default(),
            rng_seed: None,
            history_days: sim_econ::HISTORY_DAYS,
            events: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub tick_interval_ms: u64,
    pub notification_ttl_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            notification_ttl_ms: 5_000,
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Generation endpoint; the advisor is disabled when unset.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: "FINANCITY_API_KEY".to_string(),
            temperature: 0.7,
            max_retries: 3,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub base_url: Option<String>,
}

impl RuntimeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: RuntimeConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|s| !s.trim().is_empty()) {
            self.advisor.endpoint = Some(endpoint);
        }
        if let Some(url) = lookup(ACCOUNTS_URL_ENV).filter(|s| !s.trim().is_empty()) {
            self.accounts.base_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timers.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("timers.tick_interval_ms"));
        }
        if self.timers.notification_ttl_ms == 0 {
            return Err(ConfigError::ZeroDuration("timers.notification_ttl_ms"));
        }
        if self.game.start.duration_secs == 0 {
            return Err(ConfigError::ZeroDuration("game.start.duration_secs"));
        }
        if let Some(events) = &self.game.events {
            validate_catalog(events)?;
        }
        Ok(())
    }

    /// Event catalog in effect.
    pub fn catalog(&self) -> Vec<GameEventDefinition> {
        self.game.events.clone().unwrap_or_else(default_catalog)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.advisor.max_retries)
    }

    /// Build the advisor client, or `None` when no endpoint is configured.
    pub fn build_advisor<F>(&self, lookup: F) -> Result<Option<ResilientClient>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(endpoint) = &self.advisor.endpoint else {
            return Ok(None);
        };
        let key = lookup(&self.advisor.api_key_env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.advisor.api_key_env.clone()))?;
        let transport = HttpTransport::new(
            endpoint.clone(),
            key,
            Duration::from_millis(self.advisor.timeout_ms),
        )?;
        Ok(Some(ResilientClient::new(
            Arc::new(transport),
            self.retry_policy(),
        )))
    }
}
