//! Log output setup for applications embedding the client
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`init_logging`] once at startup.

use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ClientError;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error or a full EnvFilter spec)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BLOOM_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `BLOOM_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            level: env::var("BLOOM_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json: env::var("BLOOM_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Install a global `tracing` subscriber
///
/// Returns `Ok(false)` if a subscriber was already installed, leaving it in
/// place.
pub fn init_logging(config: &LogConfig) -> Result<bool, ClientError> {
    let env_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ClientError::InvalidConfig(format!("log level {:?}: {}", config.level, e)))?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    }
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LogConfig {
            level: "bloom_client=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(
            init_logging(&config),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_second_init_is_noop() {
        let config = LogConfig {
            level: "bloom_client=debug".to_string(),
            json: false,
        };
        let _ = init_logging(&config);
        assert!(!init_logging(&config).unwrap());
    }
}
