//! WebSocket signaling transport
//!
//! Speaks the gateway's text-frame protocol over tokio-tungstenite:
//!
//! | direction | frame | meaning |
//! |---|---|---|
//! | server → client | `RINGING` | incoming call |
//! | server → client | `HANGUP` | call over |
//! | server → client | `BUSY` | extension already registered, server closes next |
//! | client → server | `ANSWER` | answer the ringing call |
//! | client → server | `HANGUP` | reject or end the call |
//!
//! Binary frames carry call audio and are ignored here.

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;
use webphone_auth_core::{AuthError, Credential};

use super::{SessionTransport, SignalingTarget, TransportEvent, TransportFactory};
use crate::error::{ClientError, ClientResult};
use crate::types::HangupReason;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long a local hangup waits for the gateway's `HANGUP` before the call
/// is reported as ended anyway
pub const HANGUP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// Text frames of the signaling protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFrame {
    Ringing,
    Hangup,
    Busy,
    Answer,
}

impl SignalFrame {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "RINGING" => Some(SignalFrame::Ringing),
            "HANGUP" => Some(SignalFrame::Hangup),
            "BUSY" => Some(SignalFrame::Busy),
            "ANSWER" => Some(SignalFrame::Answer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalFrame::Ringing => "RINGING",
            SignalFrame::Hangup => "HANGUP",
            SignalFrame::Busy => "BUSY",
            SignalFrame::Answer => "ANSWER",
        }
    }

    fn to_message(self) -> Message {
        Message::Text(self.as_str().into())
    }
}

impl fmt::Display for SignalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Command {
    Answer,
    Hangup,
    Disconnect,
}

/// Everything the connection task needs, parked until `connect()`
struct Pending {
    url: Url,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<TransportEvent>,
}

/// One WebSocket session with the signaling gateway
pub struct WebSocketTransport {
    target: String,
    commands: mpsc::UnboundedSender<Command>,
    pending: Mutex<Option<Pending>>,
}

impl WebSocketTransport {
    /// Create a transport for `target`; nothing is dialed until `connect()`
    pub fn new(
        target: &SignalingTarget,
        credential: &Credential,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let transport = Self {
            target: target.to_string(),
            commands: command_tx,
            pending: Mutex::new(Some(Pending {
                url: target.url_with_token(credential),
                commands: command_rx,
                events: event_tx,
            })),
        };
        (transport, event_rx)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(target = %self.target, "Signaling session already closed, command dropped");
        }
    }
}

impl SessionTransport for WebSocketTransport {
    fn connect(&self) {
        let Some(pending) = self.pending.lock().take() else {
            warn!(target = %self.target, "Signaling session already started");
            return;
        };
        tokio::spawn(run_session(self.target.clone(), pending));
    }

    fn answer(&self) {
        self.send(Command::Answer);
    }

    fn hangup(&self) {
        self.send(Command::Hangup);
    }

    fn disconnect(&self) {
        if let Some(pending) = self.pending.lock().take() {
            // Never dialed
            let _ = pending.events.try_send(TransportEvent::Disconnected {
                reason: Some("closed before connecting".to_string()),
            });
            return;
        }
        self.send(Command::Disconnect);
    }
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("target", &self.target)
            .field("started", &self.pending.lock().is_none())
            .finish()
    }
}

/// Builds [`WebSocketTransport`]s
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransportFactory;

impl WebSocketTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for WebSocketTransportFactory {
    fn create(
        &self,
        target: &SignalingTarget,
        credential: &Credential,
    ) -> ClientResult<(Box<dyn SessionTransport>, mpsc::Receiver<TransportEvent>)> {
        if credential.is_expired() {
            return Err(ClientError::Auth(AuthError::TokenExpired));
        }
        let (transport, events) = WebSocketTransport::new(target, credential);
        Ok((Box::new(transport), events))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallPhase {
    None,
    Ringing,
    Active,
}

struct EventSink {
    events: mpsc::Sender<TransportEvent>,
}

impl EventSink {
    async fn emit(&self, event: TransportEvent) {
        if self.events.send(event).await.is_err() {
            trace!("Transport event receiver dropped");
        }
    }
}

/// Resolves once a disconnect is requested or the transport is dropped
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Disconnect => return,
            other => debug!(?other, "Ignoring command while dialing"),
        }
    }
}

async fn run_session(target: String, pending: Pending) {
    let Pending {
        url,
        mut commands,
        events,
    } = pending;
    let sink = EventSink { events };

    info!(%target, "Dialing signaling endpoint");

    let dialed = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = wait_for_close(&mut commands) => {
            info!(%target, "Disconnect requested while dialing");
            sink.emit(TransportEvent::Disconnected {
                reason: Some("disconnected while dialing".to_string()),
            })
            .await;
            return;
        }
    };

    let stream = match dialed {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(%target, error = %e, "Failed to connect to signaling endpoint");
            sink.emit(TransportEvent::Error(format!(
                "failed to connect to {}: {}",
                target, e
            )))
            .await;
            sink.emit(TransportEvent::Disconnected {
                reason: Some(e.to_string()),
            })
            .await;
            return;
        }
    };

    info!(%target, "Signaling session established");
    sink.emit(TransportEvent::Connected).await;

    let (mut write, mut read) = stream.split();
    let mut call = CallPhase::None;
    let mut local_hangup: Option<HangupReason> = None;
    let mut confirm_deadline: Option<Instant> = None;

    let reason = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match SignalFrame::parse(text.as_str()) {
                    Some(SignalFrame::Ringing) => {
                        if call == CallPhase::None {
                            call = CallPhase::Ringing;
                            local_hangup = None;
                        }
                        debug!(%target, "Incoming call");
                        sink.emit(TransportEvent::IncomingCall).await;
                    }
                    Some(SignalFrame::Hangup) => {
                        if call == CallPhase::None {
                            debug!(%target, "HANGUP with no call in progress");
                            continue;
                        }
                        let reason = local_hangup.take().unwrap_or(HangupReason::Normal);
                        call = CallPhase::None;
                        confirm_deadline = None;
                        debug!(%target, %reason, "Call ended");
                        sink.emit(TransportEvent::CallEnded(reason)).await;
                    }
                    Some(SignalFrame::Busy) => {
                        info!(%target, "Extension already registered elsewhere");
                        call = CallPhase::None;
                        confirm_deadline = None;
                        sink.emit(TransportEvent::CallEnded(HangupReason::Busy)).await;
                    }
                    Some(SignalFrame::Answer) => {
                        warn!(%target, "Unexpected ANSWER from server");
                    }
                    None => {
                        warn!(%target, frame = %text.as_str(), "Unknown signaling frame");
                    }
                },
                Some(Ok(Message::Binary(data))) => {
                    trace!(bytes = data.len(), "Ignoring audio frame");
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        warn!(%target, error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(%target, "Server closed signaling session");
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    break Some(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%target, error = %e, "Signaling session error");
                    break Some(e.to_string());
                }
                None => {
                    info!(%target, "Signaling stream ended");
                    break Some("stream ended".to_string());
                }
            },

            command = commands.recv() => match command {
                Some(Command::Answer) => {
                    if call != CallPhase::Ringing {
                        debug!(%target, "Answer with no ringing call");
                    }
                    if let Err(e) = write.send(SignalFrame::Answer.to_message()).await {
                        break Some(e.to_string());
                    }
                    call = CallPhase::Active;
                }
                Some(Command::Hangup) => {
                    local_hangup = Some(if call == CallPhase::Ringing {
                        HangupReason::Rejected
                    } else {
                        HangupReason::Normal
                    });
                    if let Err(e) = write.send(SignalFrame::Hangup.to_message()).await {
                        break Some(e.to_string());
                    }
                    confirm_deadline = Some(Instant::now() + HANGUP_CONFIRM_TIMEOUT);
                }
                Some(Command::Disconnect) | None => {
                    info!(%target, "Closing signaling session");
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            },

            _ = sleep_until(confirm_deadline.unwrap_or_else(Instant::now)), if confirm_deadline.is_some() => {
                // Group ringing never confirms a rejection
                let reason = local_hangup.take().unwrap_or(HangupReason::Normal);
                debug!(%target, %reason, "Hangup not confirmed by server, ending call locally");
                call = CallPhase::None;
                confirm_deadline = None;
                sink.emit(TransportEvent::CallEnded(reason)).await;
            }
        }
    };

    if call != CallPhase::None {
        sink.emit(TransportEvent::CallEnded(HangupReason::Failed)).await;
    }
    sink.emit(TransportEvent::Disconnected { reason }).await;
}
