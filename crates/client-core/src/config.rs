//! Controller configuration
//!
//! Durations are stored as integer milliseconds so the structs read naturally
//! from TOML:
//!
//! ```toml
//! token_timeout_ms = 10000
//! connect_timeout_ms = 10000
//! disconnect_timeout_ms = 5000
//!
//! [signaling]
//! port = 8766
//! path = "phone"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default signaling port of the gateway
pub const DEFAULT_SIGNALING_PORT: u16 = 8766;

/// Default signaling path of the gateway
pub const DEFAULT_SIGNALING_PATH: &str = "phone";

/// Static part of the signaling endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// `wss`, or `ws` for local testing
    pub scheme: String,
    pub port: u16,
    pub path: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            scheme: "wss".to_string(),
            port: DEFAULT_SIGNALING_PORT,
            path: DEFAULT_SIGNALING_PATH.to_string(),
        }
    }
}

impl SignalingConfig {
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.scheme != "wss" && self.scheme != "ws" {
            return Err(ClientError::invalid_config(
                "signaling.scheme",
                format!("expected \"wss\" or \"ws\", got \"{}\"", self.scheme),
            ));
        }
        if self.port == 0 {
            return Err(ClientError::invalid_config("signaling.port", "must not be 0"));
        }
        Ok(())
    }
}

/// Configuration for [`crate::CallController`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub signaling: SignalingConfig,
    /// Upper bound on token issuance
    pub token_timeout_ms: u64,
    /// Upper bound between dialing and the transport reporting `Connected`
    pub connect_timeout_ms: u64,
    /// Upper bound between a disconnect request and `Disconnected`
    pub disconnect_timeout_ms: u64,
    /// Capacity of the notification broadcast channel
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            token_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            disconnect_timeout_ms: 5_000,
            event_capacity: 256,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signaling(mut self, signaling: SignalingConfig) -> Self {
        self.signaling = signaling;
        self
    }

    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.signaling.validate()?;

        for (field, value) in [
            ("token_timeout_ms", self.token_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("disconnect_timeout_ms", self.disconnect_timeout_ms),
        ] {
            if value == 0 {
                return Err(ClientError::invalid_config(field, "must be greater than 0"));
            }
        }
        if self.event_capacity == 0 {
            return Err(ClientError::invalid_config(
                "event_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.token_timeout(), Duration::from_secs(10));
        assert_eq!(config.disconnect_timeout(), Duration::from_secs(5));
        assert_eq!(config.signaling.port, 8766);
    }

    #[test]
    fn test_builder() {
        let config = ControllerConfig::new()
            .with_token_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(3))
            .with_event_capacity(16);
        assert_eq!(config.token_timeout_ms, 250);
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ControllerConfig::new().with_connect_timeout(Duration::ZERO);
        match config.validate() {
            Err(ClientError::InvalidConfiguration { field, .. }) => {
                assert_eq!(field, "connect_timeout_ms")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let signaling = SignalingConfig::default().with_scheme("http");
        assert!(signaling.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ControllerConfig = toml::from_str(
            r#"
            token_timeout_ms = 2500

            [signaling]
            scheme = "ws"
            "#,
        )
        .unwrap();

        assert_eq!(config.token_timeout_ms, 2500);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.signaling.scheme, "ws");
        assert_eq!(config.signaling.port, DEFAULT_SIGNALING_PORT);
        assert_eq!(config.signaling.path, "phone");
    }
}
