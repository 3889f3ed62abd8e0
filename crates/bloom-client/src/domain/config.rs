//! Client configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use bloom_client::domain::ClientConfigBuilder;
//!
//! let config = ClientConfigBuilder::new()
//!     .endpoint("bloom.internal:8679")
//!     .timeout_ms(250)
//!     .build()
//!     .expect("Valid config");
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default server address
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:8679";

/// Default per-call timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;

/// Filter client configuration
///
/// The timeout applies uniformly to every operation. The connect timeout
/// falls back to it when unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub endpoint: String,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with validation
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let config = Self {
            endpoint: endpoint.into(),
            timeout_ms: millis_ceil(timeout),
            connect_timeout_ms: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BLOOM_ENDPOINT`: Server address (default: 127.0.0.1:8679)
    /// - `BLOOM_TIMEOUT_MS`: Per-call timeout (default: 1000)
    /// - `BLOOM_CONNECT_TIMEOUT_MS`: Dial timeout (default: per-call timeout)
    pub fn from_env() -> Result<Self, ClientError> {
        let config = Self {
            endpoint: env::var("BLOOM_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout_ms: parse_ms_var("BLOOM_TIMEOUT_MS")?.unwrap_or(DEFAULT_TIMEOUT_MS),
            connect_timeout_ms: parse_ms_var("BLOOM_CONNECT_TIMEOUT_MS")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "endpoint cannot be empty".to_string(),
            ));
        }

        if self.timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_ms cannot be 0".to_string(),
            ));
        }

        if self.connect_timeout_ms == Some(0) {
            return Err(ClientError::InvalidConfig(
                "connect_timeout_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(self.timeout_ms))
    }

    /// Builder-style method to set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builder-style method to set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = millis_ceil(timeout);
        self
    }
}

/// Whole milliseconds, rounded up so a sub-millisecond timeout stays non-zero
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

fn parse_ms_var(name: &str) -> Result<Option<u64>, ClientError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::InvalidConfig(format!("{} is not a number: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Builder for ClientConfig with validation
#[derive(Default)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.timeout_ms(millis_ceil(timeout))
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Build the ClientConfig, validating all parameters
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let defaults = ClientConfig::default();

        let config = ClientConfig {
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            connect_timeout_ms: self.connect_timeout_ms.or(defaults.connect_timeout_ms),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_connect_timeout_falls_back_to_call_timeout() {
        let config = ClientConfig::default().with_timeout(Duration::from_millis(300));
        assert_eq!(config.connect_timeout(), Duration::from_millis(300));

        let config = ClientConfig {
            connect_timeout_ms: Some(50),
            ..config
        };
        assert_eq!(config.connect_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_validation_rejects_empty_endpoint() {
        let result = ClientConfig::new("  ", Duration::from_secs(1));
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let result = ClientConfig::new("localhost:1", Duration::ZERO);
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_rejects_zero_connect_timeout() {
        let result = ClientConfigBuilder::new().connect_timeout_ms(0).build();
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_creates_valid_config() {
        let config = ClientConfigBuilder::new()
            .endpoint("bloom.internal:9000")
            .timeout(Duration::from_millis(250))
            .connect_timeout_ms(2_000)
            .build()
            .expect("Should create valid config");

        assert_eq!(config.endpoint, "bloom.internal:9000");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_builder_uses_defaults() {
        let config = ClientConfigBuilder::new().build().unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint": "10.0.0.7:8679", "timeout_ms": 40}"#).unwrap();

        assert_eq!(config.endpoint, "10.0.0.7:8679");
        assert_eq!(config.timeout(), Duration::from_millis(40));
        assert_eq!(config.connect_timeout_ms, None);
    }

    #[test]
    fn test_from_env() {
        // Only this test touches these variables
        env::set_var("BLOOM_ENDPOINT", "env-host:1234");
        env::set_var("BLOOM_TIMEOUT_MS", "75");
        env::remove_var("BLOOM_CONNECT_TIMEOUT_MS");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.endpoint, "env-host:1234");
        assert_eq!(config.timeout_ms, 75);
        assert_eq!(config.connect_timeout(), Duration::from_millis(75));

        env::set_var("BLOOM_TIMEOUT_MS", "soon");
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ClientError::InvalidConfig(_))
        ));

        env::remove_var("BLOOM_ENDPOINT");
        env::remove_var("BLOOM_TIMEOUT_MS");
    }

    #[test]
    fn test_sub_millisecond_timeouts_round_up() {
        let config = ClientConfigBuilder::new()
            .timeout(Duration::from_micros(900))
            .build()
            .unwrap();
        assert_eq!(config.timeout_ms, 1);

        let config = ClientConfig::new("localhost:8679", Duration::from_micros(1500)).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2));

        let config = ClientConfig::default().with_timeout(Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
        assert!(config.validate().is_ok());
    }
}
