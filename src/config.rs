use std::{env, fmt, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_anon_key: Option<String>,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub ai: AiConfig,
    pub rollback_on_failure: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend = parse_or("STORE_BACKEND", StoreBackend::Supabase)?;

        let (supabase_anon_key, database_url) = match store_backend {
            StoreBackend::Supabase => (Some(required("SUPABASE_ANON_KEY")?), None),
            StoreBackend::Sqlite => (None, Some(required("DATABASE_URL")?)),
        };

        let config = Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_anon_key,
            store_backend,
            database_url,
            ai: AiConfig {
                api_key: optional("AI_API_KEY"),
                base_url: optional("AI_BASE_URL"),
                model: optional("AI_MODEL"),
            },
            rollback_on_failure: parse_or("COURSE_ROLLBACK_ON_FAILURE", false)?,
        };

        info!(
            store_backend = ?config.store_backend,
            ai_configured = config.ai.api_key.is_some(),
            rollback_on_failure = config.rollback_on_failure,
            "Configuration loaded"
        );

        Ok(config)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("supabase_url", &self.supabase_url)
            .field("store_backend", &self.store_backend)
            .field("ai_configured", &self.ai.api_key.is_some())
            .field("rollback_on_failure", &self.rollback_on_failure)
            .finish_non_exhaustive()
    }
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const BASE: [(&str, Option<&str>); 8] = [
        ("SUPABASE_URL", Some("https://project.supabase.co")),
        ("SUPABASE_SERVICE_ROLE_KEY", Some("service-key")),
        ("SUPABASE_ANON_KEY", Some("anon-key")),
        ("STORE_BACKEND", None),
        ("DATABASE_URL", None),
        ("AI_API_KEY", None),
        ("AI_BASE_URL", None),
        ("COURSE_ROLLBACK_ON_FAILURE", None),
    ];

    fn with_overrides(overrides: &[(&'static str, Option<&'static str>)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars: Vec<_> = BASE
            .iter()
            .filter(|(key, _)| !overrides.iter().any(|(k, _)| k == key))
            .copied()
            .collect();
        vars.extend_from_slice(overrides);
        vars
    }

    #[test]
    #[serial]
    fn loads_supabase_defaults() {
        temp_env::with_vars(with_overrides(&[]), || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.store_backend, StoreBackend::Supabase);
            assert_eq!(config.supabase_anon_key.as_deref(), Some("anon-key"));
            assert!(config.ai.api_key.is_none());
            assert!(!config.rollback_on_failure);
        });
    }

    #[test]
    #[serial]
    fn fails_fast_without_supabase_url() {
        temp_env::with_vars(with_overrides(&[("SUPABASE_URL", None)]), || {
            assert_eq!(
                AppConfig::from_env().unwrap_err(),
                ConfigError::Missing("SUPABASE_URL")
            );
        });
    }

    #[test]
    #[serial]
    fn blank_value_counts_as_missing() {
        temp_env::with_vars(with_overrides(&[("SUPABASE_SERVICE_ROLE_KEY", Some("  "))]), || {
            assert_eq!(
                AppConfig::from_env().unwrap_err(),
                ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")
            );
        });
    }

    #[test]
    #[serial]
    fn sqlite_backend_requires_database_url() {
        temp_env::with_vars(
            with_overrides(&[("STORE_BACKEND", Some("sqlite")), ("SUPABASE_ANON_KEY", None)]),
            || {
                assert_eq!(
                    AppConfig::from_env().unwrap_err(),
                    ConfigError::Missing("DATABASE_URL")
                );
            },
        );

        temp_env::with_vars(
            with_overrides(&[
                ("STORE_BACKEND", Some("SQLite")),
                ("DATABASE_URL", Some("sqlite://courses.db")),
            ]),
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.store_backend, StoreBackend::Sqlite);
                assert_eq!(config.database_url.as_deref(), Some("sqlite://courses.db"));
            },
        );
    }

    #[test]
    #[serial]
    fn rejects_unparseable_values() {
        temp_env::with_vars(
            with_overrides(&[("COURSE_ROLLBACK_ON_FAILURE", Some("sometimes"))]),
            || {
                let err = AppConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { key: "COURSE_ROLLBACK_ON_FAILURE", .. }));
            },
        );
    }

    #[test]
    #[serial]
    fn reads_ai_settings() {
        temp_env::with_vars(
            with_overrides(&[
                ("AI_API_KEY", Some("gsk_123")),
                ("COURSE_ROLLBACK_ON_FAILURE", Some("true")),
            ]),
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.ai.api_key.as_deref(), Some("gsk_123"));
                assert!(config.rollback_on_failure);
                assert!(!format!("{:?}", config).contains("gsk_123"));
            },
        );
    }
}
