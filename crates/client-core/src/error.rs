//! Error types for the webphone client core
//!
//! Errors fall into three groups:
//!
//! - **Precondition violations** (`IdentityInvalid`, `AlreadyConnected`,
//!   `NotConnected`, `NoIncomingCall`, `NoActiveCall`) are returned
//!   synchronously from the intent that caused them and leave state untouched.
//! - **Connect failures** (`TokenIssuance`, `ConnectTimeout`, `Transport`) happen
//!   asynchronously and only ever reach the application through `on_error`.
//! - **`TransportProtocolViolation`** marks an event the transport emitted in a
//!   state where it makes no sense. It is logged and ignored.

use thiserror::Error;
use webphone_auth_core::AuthError;

use crate::types::{CallState, ConnectionState};

/// Result type for client core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors produced by the call controller and its collaborators
#[derive(Debug, Error)]
pub enum ClientError {
    /// Identity was empty or otherwise unusable
    #[error("Identity must be a non-empty extension")]
    IdentityInvalid,

    /// A session already exists (connecting, connected or still disconnecting)
    #[error("A session is already active")]
    AlreadyConnected,

    /// No session to disconnect
    #[error("Not connected")]
    NotConnected,

    /// Answer requested without a ringing call
    #[error("No incoming call to answer")]
    NoIncomingCall,

    /// Hangup requested without a ringing or active call
    #[error("No active call to hang up")]
    NoActiveCall,

    /// Token could not be obtained (including timeouts)
    #[error("Token issuance failed: {reason}")]
    TokenIssuance { reason: String },

    /// Transport did not report a connection in time
    #[error("Connection not established within {duration_ms} ms")]
    ConnectTimeout { duration_ms: u64 },

    /// Transport emitted an event that does not apply to the current state
    #[error("Transport protocol violation: {event} while {connection:?}/{call:?}")]
    TransportProtocolViolation {
        event: String,
        connection: ConnectionState,
        call: CallState,
    },

    /// Transport could not be constructed or failed to dial
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Configuration rejected by validation
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Error from the auth layer
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl ClientError {
    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a token issuance error
    pub fn token_issuance(reason: impl Into<String>) -> Self {
        Self::TokenIssuance {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was a rejected intent that changed nothing
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            ClientError::IdentityInvalid
                | ClientError::AlreadyConnected
                | ClientError::NotConnected
                | ClientError::NoIncomingCall
                | ClientError::NoActiveCall
        )
    }

    /// Whether a fresh connect attempt may succeed after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::TokenIssuance { .. }
            | ClientError::ConnectTimeout { .. }
            | ClientError::Transport { .. } => true,
            ClientError::Auth(auth) => auth.is_transient(),
            _ => false,
        }
    }
}
