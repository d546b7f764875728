//! Environment-driven service configuration
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Add RELAY_FORMAT, STRIP_SUGGESTIONS and STRICT_PERSONAS switches
//! - 1.1.0: Fail fast on a missing OPENAI_API_KEY instead of on first request
//! - 1.0.0: Initial release

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Wire format of the /chat response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFormat {
    /// Raw text fragments, `text/plain`
    Text,
    /// Server-sent events with token, suggestions and error events
    Events,
}

impl FromStr for RelayFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(RelayFormat::Text),
            "events" | "sse" | "event-stream" => Ok(RelayFormat::Events),
            other => Err(format!("expected text or events, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub temperature: f32,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub relay_timeout: Duration,
    pub relay_format: RelayFormat,
    pub strip_suggestions: bool,
    pub strict_personas: bool,
    pub hardened_prompts: bool,
    pub saints_config_path: Option<String>,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                key: "BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let temperature = parse_or("OPENAI_TEMPERATURE", get("OPENAI_TEMPERATURE"), DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: "OPENAI_TEMPERATURE",
                value: temperature.to_string(),
                reason: "must be between 0 and 2".to_string(),
            });
        }

        let timeout_secs = parse_or(
            "RELAY_TIMEOUT_SECS",
            get("RELAY_TIMEOUT_SECS"),
            DEFAULT_RELAY_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "RELAY_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let relay_format = match get("RELAY_FORMAT") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "RELAY_FORMAT",
                value: raw.clone(),
                reason,
            })?,
            None => RelayFormat::Text,
        };

        Ok(Config {
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            bind_addr,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            relay_timeout: Duration::from_secs(timeout_secs),
            relay_format,
            strip_suggestions: parse_flag("STRIP_SUGGESTIONS", get("STRIP_SUGGESTIONS"), false)?,
            strict_personas: parse_flag("STRICT_PERSONAS", get("STRICT_PERSONAS"), false)?,
            hardened_prompts: parse_flag("HARDENED_PROMPTS", get("HARDENED_PROMPTS"), true)?,
            saints_config_path: get("SAINTS_CONFIG_PATH"),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
            reason: "expected true or false".to_string(),
        }),
    }
}
