//! Configuration management for the highlight server

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub highlights: HighlightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightsConfig {
    /// How long a cleanup request waits for confirmation
    pub cleanup_confirm_timeout_ms: u64,
    /// Buffered events per bus subscriber before it lags
    pub event_bus_capacity: usize,
}

impl HighlightsConfig {
    pub fn cleanup_confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_confirm_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./highlights.db".to_string(),
            },
            highlights: HighlightsConfig {
                cleanup_confirm_timeout_ms: 2000,
                event_bus_capacity: 256,
            },
        }
    }
}

impl Config {
    /// Read settings from the environment; unset variables take defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            highlights: HighlightsConfig {
                cleanup_confirm_timeout_ms: parse_var(
                    "CLEANUP_CONFIRM_TIMEOUT_MS",
                    defaults.highlights.cleanup_confirm_timeout_ms,
                )?,
                event_bus_capacity: parse_var(
                    "EVENT_BUS_CAPACITY",
                    defaults.highlights.event_bus_capacity,
                )?,
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:./highlights.db");
        assert_eq!(
            config.highlights.cleanup_confirm_timeout(),
            Duration::from_secs(2)
        );
        assert_eq!(config.highlights.event_bus_capacity, 256);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("REDACTION_HIGHLIGHTS_TEST_PORT", "not-a-port");
        let result: Result<u16, _> = parse_var("REDACTION_HIGHLIGHTS_TEST_PORT", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        env::remove_var("REDACTION_HIGHLIGHTS_TEST_PORT");

        let fallback: u16 = parse_var("REDACTION_HIGHLIGHTS_TEST_UNSET", 7).unwrap();
        assert_eq!(fallback, 7);
    }
}
