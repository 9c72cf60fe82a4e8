//! The call controller
//!
//! [`CallController`] is the single authority over connection and call state.
//! User intents, transport events, token completions and timers all enter
//! through one serialized step: the lock is taken, [`transition`] decides, and
//! the resulting actions run before the lock is released. Nothing awaits while
//! the lock is held, so no caller can observe a half-applied transition.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webphone_auth_core::JwtTokenIssuer;
//! use webphone_client_core::{CallControllerBuilder, ControllerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let issuer = JwtTokenIssuer::with_secret("a-very-long-shared-secret")?;
//!
//! let controller = CallControllerBuilder::new()
//!     .host("pbx.example.com")
//!     .config(ControllerConfig::default())
//!     .token_issuer(Arc::new(issuer))
//!     .build()?;
//!
//! let session = controller.request_connect("2001")?;
//! println!("connecting as {}", session);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use webphone_auth_core::{Credential, Identity, TokenIssuer};

use crate::config::ControllerConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{CallEventHandler, EventEmitter, EventStream, Subscription};
use crate::session::CallSession;
use crate::state_machine::{transition, Action, Input, Phase, Rejection};
use crate::transport::{SignalingTarget, TransportEvent, TransportFactory, WebSocketTransportFactory};
use crate::types::{CallState, ConnectionState, ControllerSnapshot, SessionId};

/// Drives one softphone through connect, ring, answer, hangup and disconnect
///
/// Cheap to clone; clones share the same state. Intents must be issued from
/// within a Tokio runtime because they may spawn background tasks.
#[derive(Clone)]
pub struct CallController {
    shared: Arc<Shared>,
}

struct Shared {
    config: ControllerConfig,
    target: SignalingTarget,
    issuer: Arc<dyn TokenIssuer>,
    factory: Arc<dyn TransportFactory>,
    emitter: EventEmitter,
    state: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    session: Option<CallSession>,
    protocol_violations: u64,
}

impl CallController {
    /// Create a controller from its collaborators
    pub fn new(
        config: ControllerConfig,
        target: SignalingTarget,
        issuer: Arc<dyn TokenIssuer>,
        factory: Arc<dyn TransportFactory>,
    ) -> ClientResult<Self> {
        config.validate()?;

        info!(%target, "Call controller ready");

        Ok(Self {
            shared: Arc::new(Shared {
                emitter: EventEmitter::new(config.event_capacity),
                config,
                target,
                issuer,
                factory,
                state: Mutex::new(Inner::default()),
            }),
        })
    }

    /// Start a session for `identity`
    ///
    /// Returns as soon as the token request is under way. The outcome arrives
    /// as `on_connect` or `on_error`.
    pub fn request_connect(&self, identity: &str) -> ClientResult<SessionId> {
        self.shared
            .step(
                None,
                Input::Connect {
                    identity: identity.to_string(),
                },
                None,
            )?
            .ok_or(ClientError::IdentityInvalid)
    }

    /// Tear down the current session
    ///
    /// Valid while connecting or connected. Completion is reported by
    /// `on_disconnect`.
    pub fn request_disconnect(&self) -> ClientResult<()> {
        self.shared.step(None, Input::Disconnect, None).map(drop)
    }

    /// Answer the ringing call
    pub fn request_answer(&self) -> ClientResult<()> {
        self.shared.step(None, Input::Answer, None).map(drop)
    }

    /// Reject the ringing call or end the active one
    pub fn request_hangup(&self) -> ClientResult<()> {
        self.shared.step(None, Input::Hangup, None).map(drop)
    }

    /// Current state, read atomically
    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.shared.state.lock();
        let session = state.session.as_ref();
        ControllerSnapshot {
            connection: state.phase.connection,
            call: (state.phase.connection == ConnectionState::Connected).then_some(state.phase.call),
            identity: session.map(|s| s.identity().to_string()),
            session_id: session.map(CallSession::id),
            credential_expires_at: session
                .and_then(CallSession::credential)
                .map(Credential::expires_at),
            protocol_violations: state.protocol_violations,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.lock().phase.connection
    }

    /// Call state; `None` unless connected
    pub fn call_state(&self) -> Option<CallState> {
        let state = self.shared.state.lock();
        (state.phase.connection == ConnectionState::Connected).then_some(state.phase.call)
    }

    /// Register a notification handler
    pub fn subscribe(&self, handler: Arc<dyn CallEventHandler>) -> Subscription {
        self.shared.emitter.attach(handler)
    }

    /// Stream of every notification published from now on
    pub fn events(&self) -> EventStream {
        self.shared.emitter.subscribe()
    }

    pub fn target(&self) -> &SignalingTarget {
        &self.shared.target
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CallController")
            .field("target", &self.shared.target.to_string())
            .field("phase", &state.phase)
            .field("session", &state.session)
            .finish()
    }
}

impl Shared {
    /// Apply `input` and everything it triggers under one lock
    ///
    /// `tag` identifies the session an internal completion belongs to;
    /// completions for any other session are stale. Only the rejection of
    /// the initial input is returned, and only for preconditions. On success
    /// the id of the session live after the step is returned.
    fn step(
        self: &Arc<Self>,
        tag: Option<SessionId>,
        input: Input,
        mut credential: Option<Credential>,
    ) -> ClientResult<Option<SessionId>> {
        let mut state = self.state.lock();

        if let Some(tag) = tag {
            if state.session.as_ref().map(CallSession::id) != Some(tag) {
                trace!(session_id = %tag, input = input.name(), "Dropping input for released session");
                return Ok(state.session.as_ref().map(CallSession::id));
            }
        }

        let mut queue = VecDeque::from([input]);
        let mut first = true;

        while let Some(input) = queue.pop_front() {
            let before = state.phase;
            let outcome = transition(&before, &input);
            let initial = std::mem::replace(&mut first, false);

            let t = match outcome {
                Ok(t) => t,
                Err(Rejection::Precondition(error)) => {
                    debug!(state = %before, input = input.name(), %error, "Intent rejected");
                    if initial {
                        return Err(error);
                    }
                    continue;
                }
                Err(Rejection::ProtocolViolation(error)) => {
                    state.protocol_violations += 1;
                    warn!(
                        session_id = ?state.session.as_ref().map(CallSession::id),
                        %error,
                        "Ignoring transport event"
                    );
                    continue;
                }
                Err(Rejection::Stale) => {
                    debug!(state = %before, input = input.name(), "Ignoring stale input");
                    continue;
                }
            };

            state.phase = t.next;
            if before != t.next {
                info!(from = %before, to = %t.next, input = input.name(), "State transition");
            }

            for action in t.actions {
                self.execute(&mut state, action, &input, &mut credential, &mut queue);
            }
        }

        Ok(state.session.as_ref().map(CallSession::id))
    }

    fn execute(
        self: &Arc<Self>,
        state: &mut Inner,
        action: Action,
        input: &Input,
        credential: &mut Option<Credential>,
        queue: &mut VecDeque<Input>,
    ) {
        match action {
            Action::RequestToken => {
                let Input::Connect { identity } = input else {
                    warn!(input = input.name(), "Token requested outside of connect");
                    return;
                };
                // The transition already validated the identity
                let identity = match Identity::new(identity) {
                    Ok(identity) => identity,
                    Err(e) => {
                        queue.push_back(Input::TokenFailed {
                            reason: e.to_string(),
                        });
                        return;
                    }
                };
                let mut session = CallSession::new(identity.clone());
                let id = session.id();
                info!(session_id = %id, ext = %identity, "Requesting token");
                session.track(tokio::spawn(request_token(
                    Arc::downgrade(self),
                    id,
                    self.issuer.clone(),
                    identity,
                )));

                // Armed separately: an issuer that panics never reports back
                let timeout = self.config.token_timeout();
                session.track(tokio::spawn(fire_after(
                    Arc::downgrade(self),
                    id,
                    timeout,
                    Input::TokenFailed {
                        reason: format!("token issuance timed out after {} ms", timeout.as_millis()),
                    },
                )));
                state.session = Some(session);
            }

            Action::AttachTransport => {
                let Some(session) = state.session.as_mut() else {
                    return;
                };
                let Some(credential) = credential.take() else {
                    queue.push_back(Input::TransportSetupFailed {
                        reason: "no credential to connect with".to_string(),
                    });
                    return;
                };

                match self.factory.create(&self.target, &credential) {
                    Ok((transport, events)) => {
                        let id = session.id();
                        debug!(session_id = %id, target = %self.target, "Transport created, connecting");
                        transport.connect();
                        session.attach(credential, transport);
                        session.track(tokio::spawn(pump_events(Arc::downgrade(self), id, events)));

                        let timeout = self.config.connect_timeout();
                        session.track(tokio::spawn(fire_after(
                            Arc::downgrade(self),
                            id,
                            timeout,
                            Input::ConnectTimedOut {
                                duration_ms: self.config.connect_timeout_ms,
                            },
                        )));
                    }
                    Err(e) => {
                        warn!(session_id = %session.id(), error = %e, "Failed to create transport");
                        queue.push_back(Input::TransportSetupFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }

            Action::ForwardAnswer => {
                if let Some(transport) = state.session.as_ref().and_then(CallSession::transport) {
                    transport.answer();
                }
            }

            Action::ForwardHangup => {
                if let Some(transport) = state.session.as_ref().and_then(CallSession::transport) {
                    transport.hangup();
                }
            }

            Action::ForwardDisconnect => {
                if let Some(transport) = state.session.as_ref().and_then(CallSession::transport) {
                    transport.disconnect();
                }
            }

            Action::ArmDisconnectTimer => {
                if let Some(session) = state.session.as_mut() {
                    let id = session.id();
                    session.track(tokio::spawn(fire_after(
                        Arc::downgrade(self),
                        id,
                        self.config.disconnect_timeout(),
                        Input::DisconnectTimedOut,
                    )));
                }
            }

            Action::ReleaseSession => {
                if let Some(session) = state.session.take() {
                    info!(session_id = %session.id(), ext = %session.identity(), "Session released");
                }
                // An unused credential goes with it
                credential.take();
            }

            Action::Notify(event) => self.emitter.emit(event),
        }
    }
}

async fn request_token(
    shared: Weak<Shared>,
    id: SessionId,
    issuer: Arc<dyn TokenIssuer>,
    identity: Identity,
) {
    let result = issuer.issue_token(&identity).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };

    let (input, credential) = match result {
        Ok(credential) => {
            debug!(session_id = %id, expires_at = %credential.expires_at(), "Token issued");
            (Input::TokenIssued, Some(credential))
        }
        Err(e) => {
            warn!(session_id = %id, error = %e, "Token issuance failed");
            (Input::TokenFailed { reason: e.to_string() }, None)
        }
    };

    let _ = shared.step(Some(id), input, credential);
}

async fn pump_events(shared: Weak<Shared>, id: SessionId, mut events: mpsc::Receiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        trace!(session_id = %id, event = event.name(), "Transport event");
        let _ = shared.step(Some(id), Input::Transport(event), None);
    }

    // The transport went away without saying goodbye
    if let Some(shared) = shared.upgrade() {
        debug!(session_id = %id, "Transport event channel closed");
        let _ = shared.step(
            Some(id),
            Input::Transport(TransportEvent::Disconnected {
                reason: Some("transport event channel closed".to_string()),
            }),
            None,
        );
    }
}

async fn fire_after(shared: Weak<Shared>, id: SessionId, delay: Duration, input: Input) {
    tokio::time::sleep(delay).await;
    if let Some(shared) = shared.upgrade() {
        let _ = shared.step(Some(id), input, None);
    }
}

/// Builder for [`CallController`]
///
/// Only the host and the token issuer are required; the transport defaults to
/// [`WebSocketTransportFactory`].
#[derive(Default)]
pub struct CallControllerBuilder {
    config: ControllerConfig,
    host: Option<String>,
    issuer: Option<Arc<dyn TokenIssuer>>,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl CallControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host serving the client; the signaling endpoint lives there
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> ClientResult<CallController> {
        let host = self
            .host
            .ok_or_else(|| ClientError::invalid_config("host", "is required"))?;
        let issuer = self
            .issuer
            .ok_or_else(|| ClientError::invalid_config("token_issuer", "is required"))?;
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(WebSocketTransportFactory::new()));

        let target = SignalingTarget::new(&host, &self.config.signaling)?;
        CallController::new(self.config, target, issuer, factory)
    }
}
