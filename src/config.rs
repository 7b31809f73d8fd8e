//! Service configuration.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults,
//! 2. an optional `.env` file in the working directory,
//! 3. the process environment.
//!
//! Variables are named `<PREFIX>_<SECTION>_<KEY>`, for example
//! `STRATA_API_SHUTDOWN_TIMEOUT=30s` or `STRATA_AUTH_ACTIVE_KID=54bb2165`.
//! Unknown variables under the prefix are ignored.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::logging::LogConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("reading .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_host: SocketAddr,
    pub debug_host: SocketAddr,
    pub shutdown_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_host: SocketAddr::from(([0, 0, 0, 0], 3000)),
            debug_host: SocketAddr::from(([0, 0, 0, 0], 4000)),
            shutdown_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub issuer: String,
    pub keys_folder: PathBuf,
    pub active_kid: String,
    pub coalesce_key_misses: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "strata project".to_owned(),
            keys_folder: PathBuf::from("zarf/keys"),
            active_kid: String::new(),
            coalesce_key_misses: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub build: String,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

impl Config {
    /// Loads defaults, then `.env`, then the environment.
    pub fn load(prefix: &str) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();

        match dotenvy::dotenv_iter() {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item?;
                    vars.insert(key, value);
                }
            }
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        vars.extend(std::env::vars());
        Self::from_vars(prefix, vars)
    }

    /// Builds a config from defaults and the given variables.
    pub fn from_vars<I>(prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self { build: "develop".to_owned(), ..Self::default() };
        let lead = format!("{prefix}_");

        for (var, value) in vars {
            let Some(key) = var.strip_prefix(&lead) else {
                continue;
            };

            match key {
                "BUILD" => config.build = value,

                "API_API_HOST" => config.api.api_host = parse_addr(&var, &value)?,
                "API_DEBUG_HOST" => config.api.debug_host = parse_addr(&var, &value)?,
                "API_SHUTDOWN_TIMEOUT" => {
                    config.api.shutdown_timeout = parse_duration(&value).map_err(|reason| invalid(&var, reason))?;
                }

                "AUTH_ISSUER" => config.auth.issuer = value,
                "AUTH_KEYS_FOLDER" => config.auth.keys_folder = PathBuf::from(value),
                "AUTH_ACTIVE_KID" => config.auth.active_kid = value,
                "AUTH_COALESCE_KEY_MISSES" => config.auth.coalesce_key_misses = parse_bool(&var, &value)?,

                "LOG_LEVEL" => config.log.level = value,
                "LOG_JSON" => config.log.json = parse_bool(&var, &value)?,
                "LOG_SERVICE" => config.log.service = value,

                _ => {}
            }
        }

        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "build: {}", self.build)?;
        writeln!(f, "api.api_host: {}", self.api.api_host)?;
        writeln!(f, "api.debug_host: {}", self.api.debug_host)?;
        writeln!(f, "api.shutdown_timeout: {:?}", self.api.shutdown_timeout)?;
        writeln!(f, "auth.issuer: {}", self.auth.issuer)?;
        writeln!(f, "auth.keys_folder: {}", self.auth.keys_folder.display())?;
        writeln!(f, "auth.active_kid: {}", self.auth.active_kid)?;
        writeln!(f, "auth.coalesce_key_misses: {}", self.auth.coalesce_key_misses)?;
        writeln!(f, "log.level: {}", self.log.level)?;
        writeln!(f, "log.json: {}", self.log.json)?;
        write!(f, "log.service: {}", self.log.service)
    }
}

/// Parses `500ms`, `20s`, `5m` or `1h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let n: u64 = digits.parse().map_err(|_| format!("expected a duration, got {s:?}"))?;
    let secs = |scale: u64| {
        n.checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: {s:?}"))
    };
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "" | "s" => Ok(Duration::from_secs(n)),
        "m" => secs(60),
        "h" => secs(3600),
        other => Err(format!("unknown duration unit {other:?}")),
    }
}

fn parse_addr(var: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|e| invalid(var, format!("{e}")))
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, "expected boolean")),
    }
}

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue { var: var.to_owned(), reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars("STRATA", []).unwrap();
        assert_eq!(config.api.shutdown_timeout, Duration::from_secs(20));
        assert_eq!(config.api.api_host.port(), 3000);
        assert_eq!(config.auth.issuer, "strata project");
        assert!(!config.auth.coalesce_key_misses);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_vars(
            "STRATA",
            vars(&[
                ("STRATA_API_SHUTDOWN_TIMEOUT", "30s"),
                ("STRATA_API_API_HOST", "127.0.0.1:8080"),
                ("STRATA_AUTH_ACTIVE_KID", "54bb2165"),
                ("STRATA_AUTH_COALESCE_KEY_MISSES", "yes"),
                ("STRATA_LOG_JSON", "false"),
                ("OTHER_API_SHUTDOWN_TIMEOUT", "1s"),
                ("STRATA_UNKNOWN", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.api.api_host, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.auth.active_kid, "54bb2165");
        assert!(config.auth.coalesce_key_misses);
        assert!(!config.log.json);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_vars("STRATA", vars(&[("STRATA_LOG_JSON", "maybe")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for STRATA_LOG_JSON: expected boolean");

        let err = Config::from_vars("STRATA", vars(&[("STRATA_API_SHUTDOWN_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "STRATA_API_SHUTDOWN_TIMEOUT"));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("20s"), Ok(Duration::from_secs(20)));
        assert_eq!(parse_duration("20"), Ok(Duration::from_secs(20)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert_eq!(
            parse_duration("307445734561825861m"),
            Err(r#"duration out of range: "307445734561825861m""#.to_owned())
        );
        assert!(parse_duration("5124095576030432h").is_err());

        let err = Config::from_vars("STRATA", vars(&[("STRATA_API_SHUTDOWN_TIMEOUT", "307445734561825861m")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "STRATA_API_SHUTDOWN_TIMEOUT"));
    }
}
