//! State and identifier types shared across the client core

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection lifecycle of the signaling session
///
/// `Connecting` and `Disconnecting` are transient: they always resolve to
/// `Connected` or `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Offline,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Offline => write!(f, "Offline"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Call lifecycle, meaningful only while connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Registered and waiting for calls
    Idle,
    /// Incoming call alerting
    Ringing,
    /// Call answered and in progress
    Active,
    /// Local hangup sent, waiting for the transport to confirm
    Ending,
}

impl CallState {
    /// Whether a call exists in any phase
    pub fn in_call(&self) -> bool {
        !matches!(self, CallState::Idle)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Idle => write!(f, "Idle"),
            CallState::Ringing => write!(f, "Ringing"),
            CallState::Active => write!(f, "Active"),
            CallState::Ending => write!(f, "Ending"),
        }
    }
}

/// Why a call ended
///
/// These are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HangupReason {
    Normal,
    Busy,
    Rejected,
    Failed,
}

impl fmt::Display for HangupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HangupReason::Normal => write!(f, "Normal"),
            HangupReason::Busy => write!(f, "Busy"),
            HangupReason::Rejected => write!(f, "Rejected"),
            HangupReason::Failed => write!(f, "Failed"),
        }
    }
}

/// Identifier of one connect-to-disconnect session attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Read-only view of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub connection: ConnectionState,
    /// Present only while connected
    pub call: Option<CallState>,
    pub identity: Option<String>,
    pub session_id: Option<SessionId>,
    /// Expiry of the credential held by the current session, once issued
    pub credential_expires_at: Option<DateTime<Utc>>,
    /// Transport events ignored because they did not fit the state
    pub protocol_violations: u64,
}
