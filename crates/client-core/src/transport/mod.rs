//! Signaling transport contract
//!
//! The controller never talks to the network itself. It asks a
//! [`TransportFactory`] for a [`SessionTransport`] bound to a
//! [`SignalingTarget`] and a credential, drives it with fire-and-forget
//! intents, and consumes the [`TransportEvent`]s it emits on an `mpsc`
//! channel.

pub mod ws;

use std::fmt;

use tokio::sync::mpsc;
use url::Url;
use webphone_auth_core::Credential;

use crate::config::SignalingConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::HangupReason;

pub use ws::{WebSocketTransport, WebSocketTransportFactory};

/// Lifecycle and call events emitted by a transport
///
/// Each is emitted once per logical occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session established with the signaling endpoint
    Connected,
    /// Session closed, by either side
    Disconnected { reason: Option<String> },
    /// Remote party is calling
    IncomingCall,
    /// Current call is over
    CallEnded(HangupReason),
    /// Something went wrong without (yet) closing the session
    Error(String),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "Connected",
            TransportEvent::Disconnected { .. } => "Disconnected",
            TransportEvent::IncomingCall => "IncomingCall",
            TransportEvent::CallEnded(_) => "CallEnded",
            TransportEvent::Error(_) => "Error",
        }
    }
}

/// Opaque session with the signaling endpoint
///
/// Intents are fire-and-forget; outcomes arrive as [`TransportEvent`]s.
pub trait SessionTransport: Send + Sync {
    /// Start dialing the endpoint
    fn connect(&self);

    fn answer(&self);

    fn hangup(&self);

    /// Close the session; a `Disconnected` event follows
    fn disconnect(&self);
}

/// Builds a transport for one session attempt
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        target: &SignalingTarget,
        credential: &Credential,
    ) -> ClientResult<(Box<dyn SessionTransport>, mpsc::Receiver<TransportEvent>)>;
}

/// Address of the signaling endpoint, `wss://<host>:<port>/<path>`
///
/// # Examples
///
/// ```rust
/// use webphone_client_core::{SignalingConfig, SignalingTarget};
///
/// let target = SignalingTarget::new("pbx.example.com", &SignalingConfig::default()).unwrap();
/// assert_eq!(target.to_string(), "wss://pbx.example.com:8766/phone");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingTarget {
    url: Url,
}

impl SignalingTarget {
    /// Derive the target from the serving host and static port/path settings
    pub fn new(host: &str, config: &SignalingConfig) -> ClientResult<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ClientError::invalid_config("host", "must not be empty"));
        }
        config.validate()?;

        // Bare IPv6 literals need brackets in a URL authority
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let raw = format!(
            "{}://{}:{}/{}",
            config.scheme,
            authority,
            config.port,
            config.path.trim_start_matches('/')
        );
        let url = Url::parse(&raw)
            .map_err(|e| ClientError::invalid_config("host", format!("{}: {}", host, e)))?;

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// URL the transport dials: the target with `?token=<credential>`
    ///
    /// The result carries a secret and must not be logged.
    pub fn url_with_token(&self, credential: &Credential) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("token", credential.token());
        url
    }
}

impl fmt::Display for SignalingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use webphone_auth_core::Identity;

    fn credential(token: &str) -> Credential {
        let now = Utc::now();
        Credential::new(
            token,
            Identity::new("2001").unwrap(),
            now,
            now + Duration::seconds(300),
        )
    }

    #[test]
    fn test_default_target() {
        let target = SignalingTarget::new("10.0.0.5", &SignalingConfig::default()).unwrap();
        assert_eq!(target.url().as_str(), "wss://10.0.0.5:8766/phone");
        assert_eq!(target.host(), "10.0.0.5");
    }

    #[test]
    fn test_custom_port_and_path() {
        let config = SignalingConfig::default()
            .with_scheme("ws")
            .with_port(9000)
            .with_path("/gateway/phone");
        let target = SignalingTarget::new("localhost", &config).unwrap();
        assert_eq!(target.to_string(), "ws://localhost:9000/gateway/phone");
    }

    #[test]
    fn test_token_is_query_parameter() {
        let target = SignalingTarget::new("pbx.local", &SignalingConfig::default()).unwrap();
        let url = target.url_with_token(&credential("abc.def.ghi"));
        assert_eq!(url.as_str(), "wss://pbx.local:8766/phone?token=abc.def.ghi");
        // Display never carries the token
        assert!(!target.to_string().contains("token"));
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let target = SignalingTarget::new("::1", &SignalingConfig::default()).unwrap();
        assert_eq!(target.to_string(), "wss://[::1]:8766/phone");
        assert_eq!(target.host(), "[::1]");

        let target = SignalingTarget::new("[fe80::1]", &SignalingConfig::default()).unwrap();
        assert_eq!(target.url().port(), Some(8766));
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = SignalingTarget::new("  ", &SignalingConfig::default()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration { ref field, .. } if field == "host"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TransportEvent::CallEnded(HangupReason::Busy).name(), "CallEnded");
        assert_eq!(TransportEvent::Disconnected { reason: None }.name(), "Disconnected");
    }
}
