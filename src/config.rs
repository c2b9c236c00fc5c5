//! 起動時設定
//!
//! 環境変数から一度だけ読み込む。テストでは`from_lookup`に任意の関数を渡す。

use chrono::Duration;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::reservation::{DEFAULT_HOLD_DAYS, MAX_HOLD_DAYS};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/library";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// 設定のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("RESERVATION_HOLD_DAYS must be at least 1 (got {0})")]
    HoldTooShort(i64),

    #[error("RESERVATION_HOLD_DAYS must be at most {} (got {0})", MAX_HOLD_DAYS)]
    HoldTooLong(i64),
}

/// 永続化の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub storage: StorageBackend,
    pub reservation_hold_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let storage = parse_or(&lookup, "LIBRARY_STORAGE", StorageBackend::Postgres)?;
        let reservation_hold_days = parse_or(&lookup, "RESERVATION_HOLD_DAYS", DEFAULT_HOLD_DAYS)?;

        if reservation_hold_days < 1 {
            return Err(ConfigError::HoldTooShort(reservation_hold_days));
        }
        if reservation_hold_days > MAX_HOLD_DAYS {
            return Err(ConfigError::HoldTooLong(reservation_hold_days));
        }

        Ok(Self {
            database_url,
            port,
            max_connections,
            storage,
            reservation_hold_days,
        })
    }

    /// 範囲外の値（フィールドを直接書き換えた場合）は既定値に戻す
    pub fn reservation_hold(&self) -> Duration {
        Some(self.reservation_hold_days)
            .filter(|days| (1..=MAX_HOLD_DAYS).contains(days))
            .and_then(Duration::try_days)
            .unwrap_or_else(|| Duration::days(DEFAULT_HOLD_DAYS))
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.database_url, "postgres://localhost/library");
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.reservation_hold(), Duration::days(7));
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/lib"),
            ("PORT", "8080"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("LIBRARY_STORAGE", "Memory"),
            ("RESERVATION_HOLD_DAYS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://db/lib");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.reservation_hold_days, 3);
    }

    #[test]
    fn test_invalid_port() {
        let result = AppConfig::from_lookup(lookup_from(&[("PORT", "http")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                name: "PORT",
                value: "http".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_storage() {
        let result = AppConfig::from_lookup(lookup_from(&[("LIBRARY_STORAGE", "redis")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "LIBRARY_STORAGE",
                ..
            })
        ));
    }

    #[test]
    fn test_hold_must_be_positive() {
        let result = AppConfig::from_lookup(lookup_from(&[("RESERVATION_HOLD_DAYS", "0")]));
        assert_eq!(result, Err(ConfigError::HoldTooShort(0)));
    }

    #[test]
    fn test_hold_is_capped() {
        let result =
            AppConfig::from_lookup(lookup_from(&[("RESERVATION_HOLD_DAYS", "100000000")]));
        assert_eq!(result, Err(ConfigError::HoldTooLong(100_000_000)));

        let config = AppConfig::from_lookup(lookup_from(&[("RESERVATION_HOLD_DAYS", "365")])).unwrap();
        assert_eq!(config.reservation_hold(), Duration::days(365));
    }

    #[test]
    fn test_reservation_hold_never_panics() {
        let mut config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        config.reservation_hold_days = i64::MAX;

        assert_eq!(config.reservation_hold(), Duration::days(7));
    }
}
