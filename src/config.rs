use std::net::SocketAddr;

use thiserror::Error;

use crate::store::DEFAULT_DB_PATH;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

// Process configuration, read once in main
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub google_client_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?,
            None => 3000,
        };

        let jwt_ttl_days = match get("JWT_TTL_DAYS") {
            Some(v) => match v.trim().parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => return Err(ConfigError::Invalid { key: "JWT_TTL_DAYS", value: v }),
            },
            None => 7,
        };

        Ok(Config {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            db_path: get("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            jwt_secret: get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_days,
            google_client_id: get("GOOGLE_CLIENT_ID"),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "HOST",
                value: self.host.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(
            config,
            Config {
                host: "127.0.0.1".into(),
                port: 3000,
                db_path: "data/db.json".into(),
                jwt_secret: "s3cret".into(),
                jwt_ttl_days: 7,
                google_client_id: None,
            }
        );
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn jwt_secret_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[("JWT_SECRET", "  ")])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn bad_numbers_rejected() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "PORT", value: "eighty".into() });

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("JWT_TTL_DAYS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_TTL_DAYS", .. }));
    }

    #[test]
    fn overrides_read() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("GOOGLE_CLIENT_ID", "abc.apps.googleusercontent.com"),
        ]))
        .unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(
            config.google_client_id.as_deref(),
            Some("abc.apps.googleusercontent.com")
        );
    }
}
