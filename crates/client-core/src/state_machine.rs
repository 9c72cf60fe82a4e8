//! Pure transition function for the connection and call lifecycle
//!
//! Every user intent, internal completion and transport event is expressed
//! as an [`Input`]. [`transition`] maps the current [`Phase`] and an input to
//! either a [`Transition`] (next phase plus the side effects to run) or a
//! [`Rejection`]. It performs no I/O; the controller executes the returned
//! [`Action`]s in order.
//!
//! ```text
//!            connect                 Connected
//! Offline ───────────► Connecting ─────────────► Connected/Idle
//!    ▲                     │                      │   ▲
//!    │  token failure,     │ disconnect           │   │ CallEnded
//!    │  timeout            ▼                      ▼   │
//!    └─────────────── Disconnecting ◄──── Ringing ─► Active ─► Ending
//! ```

use std::fmt;

use webphone_auth_core::Identity;

use crate::error::ClientError;
use crate::events::{ControllerEvent, ErrorDetail, ErrorKind};
use crate::transport::TransportEvent;
use crate::types::{CallState, ConnectionState, HangupReason};

/// Everything the transition function needs to know about the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub connection: ConnectionState,
    /// Always `Idle` unless connected
    pub call: CallState,
    /// Whether a transport has been constructed for the current session
    pub transport_attached: bool,
}

impl Phase {
    pub const OFFLINE: Phase = Phase {
        connection: ConnectionState::Offline,
        call: CallState::Idle,
        transport_attached: false,
    };

    fn with_connection(self, connection: ConnectionState) -> Self {
        Self { connection, ..self }
    }

    fn with_call(self, call: CallState) -> Self {
        Self { call, ..self }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::OFFLINE
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.connection == ConnectionState::Connected {
            write!(f, "{}/{}", self.connection, self.call)
        } else {
            write!(f, "{}", self.connection)
        }
    }
}

/// Tagged union of everything that can drive the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    // User intents
    Connect { identity: String },
    Disconnect,
    Answer,
    Hangup,

    // Internal completions and timers
    TokenIssued,
    TokenFailed { reason: String },
    TransportSetupFailed { reason: String },
    ConnectTimedOut { duration_ms: u64 },
    DisconnectTimedOut,

    // Events from the transport
    Transport(TransportEvent),
}

impl Input {
    /// Short name used in logs and violation reports
    pub fn name(&self) -> &'static str {
        match self {
            Input::Connect { .. } => "Connect",
            Input::Disconnect => "Disconnect",
            Input::Answer => "Answer",
            Input::Hangup => "Hangup",
            Input::TokenIssued => "TokenIssued",
            Input::TokenFailed { .. } => "TokenFailed",
            Input::TransportSetupFailed { .. } => "TransportSetupFailed",
            Input::ConnectTimedOut { .. } => "ConnectTimedOut",
            Input::DisconnectTimedOut => "DisconnectTimedOut",
            Input::Transport(event) => event.name(),
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start token issuance for the new session
    RequestToken,
    /// Build the transport from the issued credential, start it and arm the
    /// connect timer
    AttachTransport,
    ForwardAnswer,
    ForwardHangup,
    ForwardDisconnect,
    ArmDisconnectTimer,
    /// Drop the session, its credential and its transport handle
    ReleaseSession,
    Notify(ControllerEvent),
}

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Phase,
    pub actions: Vec<Action>,
}

impl Transition {
    fn to(next: Phase) -> Self {
        Self {
            next,
            actions: Vec::new(),
        }
    }

    fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    fn notify(self, event: ControllerEvent) -> Self {
        self.with(Action::Notify(event))
    }
}

/// Why an input was not applied
#[derive(Debug)]
pub enum Rejection {
    /// A user intent that is not valid in the current phase
    Precondition(ClientError),
    /// A transport event that makes no sense in the current phase
    ProtocolViolation(ClientError),
    /// A completion or timer that no longer applies
    Stale,
}

/// Compute the next phase and actions for `input`
pub fn transition(phase: &Phase, input: &Input) -> Result<Transition, Rejection> {
    use CallState as C;
    use ConnectionState as S;

    let p = *phase;
    let attached = p.transport_attached;

    match input {
        Input::Connect { identity } => {
            if p.connection != S::Offline {
                return Err(Rejection::Precondition(ClientError::AlreadyConnected));
            }
            if !Identity::is_valid(identity) {
                return Err(Rejection::Precondition(ClientError::IdentityInvalid));
            }
            Ok(Transition::to(Phase {
                connection: S::Connecting,
                call: C::Idle,
                transport_attached: false,
            })
            .with(Action::RequestToken))
        }

        Input::Disconnect => match p.connection {
            S::Connecting if !attached => Ok(Transition::to(p.with_connection(S::Disconnecting))
                .with(Action::ArmDisconnectTimer)),
            S::Connecting | S::Connected => Ok(Transition::to(
                p.with_connection(S::Disconnecting).with_call(C::Idle),
            )
            .with(Action::ForwardDisconnect)
            .with(Action::ArmDisconnectTimer)),
            _ => Err(Rejection::Precondition(ClientError::NotConnected)),
        },

        Input::Answer => match (p.connection, p.call) {
            (S::Connected, C::Ringing) => {
                Ok(Transition::to(p.with_call(C::Active)).with(Action::ForwardAnswer))
            }
            _ => Err(Rejection::Precondition(ClientError::NoIncomingCall)),
        },

        Input::Hangup => match (p.connection, p.call) {
            (S::Connected, C::Ringing | C::Active) => {
                Ok(Transition::to(p.with_call(C::Ending)).with(Action::ForwardHangup))
            }
            _ => Err(Rejection::Precondition(ClientError::NoActiveCall)),
        },

        Input::TokenIssued => match p.connection {
            S::Connecting if !attached => Ok(Transition::to(Phase {
                transport_attached: true,
                ..p
            })
            .with(Action::AttachTransport)),
            // Disconnect won the race: the credential is dropped unused
            S::Disconnecting if !attached => Ok(released().notify(ControllerEvent::Disconnected)),
            _ => Err(Rejection::Stale),
        },

        Input::TokenFailed { reason } => match p.connection {
            S::Connecting if !attached => Ok(released().notify(ControllerEvent::Error {
                detail: ErrorDetail::new(ErrorKind::TokenIssuance, reason.clone()),
            })),
            S::Disconnecting if !attached => Ok(released().notify(ControllerEvent::Disconnected)),
            _ => Err(Rejection::Stale),
        },

        Input::TransportSetupFailed { reason } => match p.connection {
            S::Connecting if attached => Ok(released().notify(ControllerEvent::Error {
                detail: ErrorDetail::new(ErrorKind::Transport, reason.clone()),
            })),
            _ => Err(Rejection::Stale),
        },

        Input::ConnectTimedOut { duration_ms } => match p.connection {
            S::Connecting if attached => {
                let error = ClientError::ConnectTimeout {
                    duration_ms: *duration_ms,
                };
                let mut t = released();
                t.actions.insert(0, Action::ForwardDisconnect);
                Ok(t.notify(ControllerEvent::Error {
                    detail: ErrorDetail::new(ErrorKind::ConnectTimeout, error.to_string()),
                }))
            }
            _ => Err(Rejection::Stale),
        },

        Input::DisconnectTimedOut => match p.connection {
            S::Disconnecting => Ok(released().notify(ControllerEvent::Disconnected)),
            _ => Err(Rejection::Stale),
        },

        Input::Transport(event) => transport_transition(p, event),
    }
}

fn transport_transition(p: Phase, event: &TransportEvent) -> Result<Transition, Rejection> {
    use CallState as C;
    use ConnectionState as S;

    let attached = p.transport_attached;

    match event {
        TransportEvent::Connected => match p.connection {
            S::Connecting if attached => Ok(Transition::to(Phase {
                connection: S::Connected,
                call: C::Idle,
                transport_attached: true,
            })
            .notify(ControllerEvent::Connected)),
            // Connected raced with a local disconnect
            S::Disconnecting => Err(Rejection::Stale),
            _ => Err(violation(p, event)),
        },

        TransportEvent::Disconnected { .. } => match p.connection {
            S::Connecting | S::Disconnecting if attached => {
                Ok(released().notify(ControllerEvent::Disconnected))
            }
            S::Connected => Ok(released().notify(ControllerEvent::Disconnected)),
            _ => Err(violation(p, event)),
        },

        TransportEvent::IncomingCall => match (p.connection, p.call) {
            (S::Connected, C::Idle) => {
                Ok(Transition::to(p.with_call(C::Ringing)).notify(ControllerEvent::Ringing))
            }
            (S::Disconnecting, _) => Err(Rejection::Stale),
            _ => Err(violation(p, event)),
        },

        TransportEvent::CallEnded(reason) => match (p.connection, p.call) {
            (S::Connected, C::Ringing | C::Active | C::Ending) => Ok(Transition::to(
                p.with_call(C::Idle),
            )
            .notify(ControllerEvent::Hangup { reason: *reason })),
            // The gateway refuses a second registration of an extension this way
            (S::Connected, C::Idle) if *reason == HangupReason::Busy => {
                Ok(Transition::to(p).notify(ControllerEvent::Hangup { reason: *reason }))
            }
            (S::Disconnecting, _) => Err(Rejection::Stale),
            _ => Err(violation(p, event)),
        },

        TransportEvent::Error(message) => match p.connection {
            S::Offline => Err(violation(p, event)),
            _ => Ok(Transition::to(p).notify(ControllerEvent::Error {
                detail: ErrorDetail::new(ErrorKind::Transport, message.clone()),
            })),
        },
    }
}

fn released() -> Transition {
    Transition::to(Phase::OFFLINE).with(Action::ReleaseSession)
}

fn violation(p: Phase, event: &TransportEvent) -> Rejection {
    Rejection::ProtocolViolation(ClientError::TransportProtocolViolation {
        event: event.name().to_string(),
        connection: p.connection,
        call: p.call,
    })
}
