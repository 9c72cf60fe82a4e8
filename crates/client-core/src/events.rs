//! Notifications emitted by the call controller
//!
//! Every state change the presentation layer cares about is published as a
//! [`ControllerEvent`] on a broadcast channel. Consumers either read the
//! stream directly ([`EventEmitter::subscribe`]) or register a
//! [`CallEventHandler`], which gets its own dispatch task so that several
//! handlers can listen to the same notification.
//!
//! # Examples
//!
//! ```rust
//! use webphone_client_core::events::{CallEventHandler, ErrorDetail};
//! use webphone_client_core::HangupReason;
//! use async_trait::async_trait;
//!
//! struct StatusLine;
//!
//! #[async_trait]
//! impl CallEventHandler for StatusLine {
//!     async fn on_ring(&self) {
//!         println!("Incoming call...");
//!     }
//!
//!     async fn on_hangup(&self, reason: HangupReason) {
//!         if reason == HangupReason::Busy {
//!             println!("Line busy");
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::types::HangupReason;

/// Category of an asynchronous failure reported through `on_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Token could not be obtained or timed out
    TokenIssuance,
    /// Transport never reported a connection
    ConnectTimeout,
    /// Transport construction failed or the transport reported an error
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TokenIssuance => write!(f, "TokenIssuanceError"),
            ErrorKind::ConnectTimeout => write!(f, "ConnectTimeout"),
            ErrorKind::Transport => write!(f, "TransportError"),
        }
    }
}

/// Payload of `on_error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Notification published after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Session established; call state is Idle
    Connected,
    /// Session fully torn down; credential discarded
    Disconnected,
    /// Incoming call alerting
    Ringing,
    /// Call ended
    Hangup { reason: HangupReason },
    /// Asynchronous failure
    Error { detail: ErrorDetail },
}

/// Receives controller notifications
///
/// All methods default to doing nothing, so implementors only override what
/// they render. Handlers run on their own task, in publication order.
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    async fn on_connect(&self) {}

    async fn on_disconnect(&self) {}

    async fn on_ring(&self) {}

    async fn on_hangup(&self, _reason: HangupReason) {}

    async fn on_error(&self, _detail: ErrorDetail) {}
}

/// Event stream type
pub type EventStream = BroadcastStream<ControllerEvent>;

/// Fan-out point for controller notifications
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<ControllerEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every subscriber
    pub fn emit(&self, event: ControllerEvent) {
        debug!(?event, receivers = self.sender.receiver_count(), "Publishing controller event");
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Run `handler` for every event published from now on
    pub fn attach(&self, handler: Arc<dyn CallEventHandler>) -> Subscription {
        let mut receiver = self.sender.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => dispatch(handler.as_ref(), event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event handler lagged behind, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { handle }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

async fn dispatch(handler: &dyn CallEventHandler, event: ControllerEvent) {
    match event {
        ControllerEvent::Connected => handler.on_connect().await,
        ControllerEvent::Disconnected => handler.on_disconnect().await,
        ControllerEvent::Ringing => handler.on_ring().await,
        ControllerEvent::Hangup { reason } => handler.on_hangup(reason).await,
        ControllerEvent::Error { detail } => handler.on_error(detail).await,
    }
}

/// Handle to a registered [`CallEventHandler`]
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`]
/// to stop it.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}
