//! Structured logging.
//!
//! One `tracing-subscriber` fmt layer, JSON for production or human-readable
//! for development, behind an `EnvFilter`. `RUST_LOG`, when set, wins over
//! the configured level.

use thiserror::Error;
use tracing::info;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `strata=debug,hyper=warn`.
    pub level: String,
    pub json: bool,
    pub service: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), json: true, service: "strata".to_owned() }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: ParseError,
    },

    #[error("installing log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|source| LoggingError::Filter { filter: config.level.clone(), source })?,
    };

    let layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_filter(filter).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_filter(filter).boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    info!(service = %config.service, json = config.json, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_directives() {
        let config = LogConfig { level: "strata=loud".to_owned(), ..LogConfig::default() };
        // RUST_LOG takes precedence; only meaningful when it is unset.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(init(&config), Err(LoggingError::Filter { .. })));
        }
    }
}
