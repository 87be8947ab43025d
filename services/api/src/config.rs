//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::collections::HashSet;
use std::net::SocketAddr;

use chrono::Duration;
use loan_ledger_core::LedgerSettings;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub token_ttl: Option<Duration>,
    pub admin_phones: HashSet<String>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DATABASE_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", raw),
                )
            })?,
            None => 5,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session Settings ---
        let token_ttl = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => {
                let minutes = raw.parse::<i64>().ok().filter(|m| *m > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "TOKEN_TTL_MINUTES".to_string(),
                        format!("'{}' is not a positive number of minutes", raw),
                    )
                })?;
                Some(Duration::minutes(minutes))
            }
            None => None,
        };

        let admin_phones = lookup("ADMIN_PHONES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            token_ttl,
            admin_phones,
            cors_origin,
        })
    }

    /// The subset of settings the ledger service needs.
    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            token_ttl: self.token_ttl,
            admin_phones: self.admin_phones.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/loans")]).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.token_ttl.is_none());
        assert!(config.admin_phones.is_empty());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"));
    }

    #[test]
    fn parses_session_settings() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/loans"),
            ("TOKEN_TTL_MINUTES", "30"),
            ("ADMIN_PHONES", "380500000000, 380500000001,,"),
        ])
        .unwrap();
        assert_eq!(config.token_ttl, Some(Duration::minutes(30)));
        assert_eq!(config.admin_phones.len(), 2);
        assert!(config.ledger_settings().admin_phones.contains("380500000001"));
    }

    #[rstest]
    #[case("BIND_ADDRESS", "not-an-address")]
    #[case("RUST_LOG", "loud")]
    #[case("TOKEN_TTL_MINUTES", "0")]
    #[case("DATABASE_MAX_CONNECTIONS", "-1")]
    fn rejects_invalid_values(#[case] key: &str, #[case] value: &str) {
        let result = load(&[("DATABASE_URL", "postgres://localhost/loans"), (key, value)]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(var, _)) if var == key));
    }
}
