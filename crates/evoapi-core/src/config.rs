//! Configuration from `EVOLUTION_*` environment variables.
//!
//! Variables:
//! - EVOLUTION_BASE_URL: server URL (e.g. http://localhost:8080)
//! - EVOLUTION_API_TOKEN: API key sent in the `apikey` header
//! - EVOLUTION_INSTANCE_NAME: configured instance
//! - EVOLUTION_TIMEOUT: request timeout in seconds (optional, 5-300, default 30)
//!
//! A `.env` file in the working directory is loaded first; variables already
//! set in the environment win.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Connection settings for one instance.
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub base_url: String,
    pub api_token: String,
    pub instance_name: String,
    pub timeout: Duration,
}

impl EvolutionConfig {
    /// Load from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = required(&lookup, "EVOLUTION_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "EVOLUTION_BASE_URL",
                reason: format!("'{}' must start with http:// or https://", base_url),
            });
        }

        let api_token = required(&lookup, "EVOLUTION_API_TOKEN")?;
        let instance_name = required(&lookup, "EVOLUTION_INSTANCE_NAME")?;

        let timeout_secs = match lookup("EVOLUTION_TIMEOUT") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: "EVOLUTION_TIMEOUT",
                    reason: format!("'{}' is not a number of seconds", raw),
                })?;
                if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
                    return Err(ConfigError::Invalid {
                        name: "EVOLUTION_TIMEOUT",
                        reason: format!(
                            "{} is outside {}-{} seconds",
                            secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS
                        ),
                    });
                }
                secs
            }
        };

        let config = Self {
            base_url,
            api_token,
            instance_name,
            timeout: Duration::from_secs(timeout_secs),
        };

        tracing::info!(
            base_url = %config.base_url,
            instance = %config.instance_name,
            timeout_secs,
            "configuration loaded"
        );

        Ok(config)
    }
}

/// Fetch a required variable, trimmed and non-empty.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).ok_or(ConfigError::Missing(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
