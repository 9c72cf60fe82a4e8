//! # Client-Core - Call/session state machine for the webphone
//!
//! This crate owns the softphone's connection and call lifecycle:
//!
//! - [`CallController`] validates user intents, requests a token, drives a
//!   signaling transport and publishes notifications
//! - [`state_machine`] is the pure transition function behind it
//! - [`transport`] defines the transport contract and ships a WebSocket
//!   implementation speaking the gateway's text-frame protocol
//! - [`events`] fans notifications out to any number of handlers
//!
//! ## Architecture
//!
//! ```text
//! user intent ──► CallController ──► SessionTransport ──► gateway
//!                    ▲      │                │
//!                    │      └─► TokenIssuer  │
//!                    └──── TransportEvent ◄──┘
//!                    │
//!                    └──► CallEventHandler (on_connect, on_ring, ...)
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod session;
pub mod state_machine;
pub mod transport;
pub mod types;

pub use config::{ControllerConfig, SignalingConfig};
pub use controller::{CallController, CallControllerBuilder};
pub use error::{ClientError, ClientResult};
pub use events::{CallEventHandler, ControllerEvent, ErrorDetail, ErrorKind, EventStream, Subscription};
pub use session::CallSession;
pub use transport::{
    SessionTransport, SignalingTarget, TransportEvent, TransportFactory, WebSocketTransport,
    WebSocketTransportFactory,
};
pub use types::{CallState, ConnectionState, ControllerSnapshot, HangupReason, SessionId};
