use std::{env, time::Duration};

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_JWT_TTL_HOURS: i64 = 168;
const DEFAULT_UPTIME_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingJwtSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `NODE_ENV=production`: 500 responses hide the underlying error.
    pub production: bool,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    pub cors_origins: CorsOrigins,
    /// `None` means the default SQLite file under the asset directory.
    pub database_url: Option<String>,
    /// `None` disables the uptime monitor.
    pub uptime_interval: Option<Duration>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("production", &self.production)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("cors_origins", &self.cors_origins)
            .field("database_url", &self.database_url)
            .field("uptime_interval", &self.uptime_interval)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| env::var(name).ok())
    }

    pub fn from_env_with<F>(get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = non_empty(get_env("JWT_SECRET")).ok_or(ConfigError::MissingJwtSecret)?;

        let production = non_empty(get_env("NODE_ENV"))
            .map(|value| value.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let cors_origins = match non_empty(get_env("CORS_ORIGIN")) {
            None => CorsOrigins::Any,
            Some(raw) if raw == "*" => CorsOrigins::Any,
            Some(raw) => CorsOrigins::List(
                raw.split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            ),
        };

        let uptime_secs = read_env_parsed(
            "UPTIME_INTERVAL_SECS",
            DEFAULT_UPTIME_INTERVAL_SECS,
            &get_env,
        );
        let jwt_ttl_hours = read_env_parsed("JWT_TTL_HOURS", DEFAULT_JWT_TTL_HOURS, &get_env);
        let jwt_ttl_hours = if jwt_ttl_hours <= 0 {
            tracing::warn!("JWT_TTL_HOURS must be positive. Using default {DEFAULT_JWT_TTL_HOURS}.");
            DEFAULT_JWT_TTL_HOURS
        } else {
            jwt_ttl_hours
        };

        Ok(Self {
            host: non_empty(get_env("HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: read_env_parsed("PORT", DEFAULT_PORT, &get_env),
            production,
            jwt_secret,
            jwt_ttl: chrono::Duration::hours(jwt_ttl_hours),
            cors_origins,
            database_url: non_empty(get_env("DATABASE_URL")),
            uptime_interval: (uptime_secs > 0).then(|| Duration::from_secs(uptime_secs)),
        })
    }

    /// Settings for in-process tests: fixed secret, in-memory database, no monitor.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            production: false,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl: chrono::Duration::hours(1),
            cors_origins: CorsOrigins::Any,
            database_url: Some("sqlite::memory:".to_string()),
            uptime_interval: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_env_parsed<T, F>(name: &str, default: T, get_env: &F) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(get_env(name)) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_env_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn jwt_secret_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::MissingJwtSecret);
        assert_eq!(
            config(&[("JWT_SECRET", "   ")]).unwrap_err(),
            ConfigError::MissingJwtSecret
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(!cfg.production);
        assert_eq!(cfg.jwt_ttl, chrono::Duration::hours(168));
        assert_eq!(cfg.cors_origins, CorsOrigins::Any);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.uptime_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "not-a-port"),
            ("NODE_ENV", "production"),
            ("CORS_ORIGIN", "https://app.vibeweb.dev/, https://admin.vibeweb.dev"),
            ("UPTIME_INTERVAL_SECS", "0"),
            ("JWT_TTL_HOURS", "-4"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 3000);
        assert!(cfg.production);
        assert_eq!(
            cfg.cors_origins,
            CorsOrigins::List(vec![
                "https://app.vibeweb.dev".to_string(),
                "https://admin.vibeweb.dev".to_string()
            ])
        );
        assert_eq!(cfg.uptime_interval, None);
        assert_eq!(cfg.jwt_ttl, chrono::Duration::hours(168));
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
