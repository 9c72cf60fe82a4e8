//! Fakes shared by the controller integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::StreamExt;
use webphone_auth_core::{AuthError, Credential, Identity, TokenIssuer};
use webphone_client_core::{
    CallController, CallEventHandler, ClientError, ClientResult, ControllerConfig,
    ControllerEvent, ErrorDetail, EventStream, HangupReason, SessionTransport, SignalingTarget,
    TransportEvent, TransportFactory,
};

/// How long a test waits for something that should happen
pub const WAIT: Duration = Duration::from_secs(5);

/// Issues a distinct token on every call
#[derive(Default)]
pub struct FakeIssuer {
    calls: AtomicUsize,
}

impl FakeIssuer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn issue_token(&self, identity: &Identity) -> webphone_auth_core::Result<Credential> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        Ok(Credential::new(
            format!("token-{}-{}", identity, n),
            identity.clone(),
            now,
            now + chrono::Duration::seconds(300),
        ))
    }
}

/// Always fails like an unreachable token endpoint
pub struct FailingIssuer;

#[async_trait]
impl TokenIssuer for FailingIssuer {
    async fn issue_token(&self, _identity: &Identity) -> webphone_auth_core::Result<Credential> {
        Err(AuthError::NetworkError("connection refused".to_string()))
    }
}

/// Never answers
pub struct PendingIssuer;

#[async_trait]
impl TokenIssuer for PendingIssuer {
    async fn issue_token(&self, _identity: &Identity) -> webphone_auth_core::Result<Credential> {
        std::future::pending().await
    }
}

/// Panics inside the issuing task
pub struct PanickingIssuer;

#[async_trait]
impl TokenIssuer for PanickingIssuer {
    async fn issue_token(&self, identity: &Identity) -> webphone_auth_core::Result<Credential> {
        panic!("issuer blew up for {}", identity);
    }
}

/// Holds every request until [`GatedIssuer::open`] is called
pub struct GatedIssuer {
    inner: FakeIssuer,
    gate: Notify,
}

impl GatedIssuer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: FakeIssuer::default(),
            gate: Notify::new(),
        })
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl TokenIssuer for GatedIssuer {
    async fn issue_token(&self, identity: &Identity) -> webphone_auth_core::Result<Credential> {
        self.gate.notified().await;
        self.inner.issue_token(identity).await
    }
}

/// Test-side end of a fake transport
pub struct FakeHandle {
    pub token: String,
    pub url: String,
    events: mpsc::Sender<TransportEvent>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FakeHandle {
    /// Deliver an event as if the transport emitted it
    pub async fn emit(&self, event: TransportEvent) {
        // The controller may already have released the session
        let _ = self.events.send(event).await;
    }

    /// Intents the controller forwarded, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

struct FakeTransport {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl SessionTransport for FakeTransport {
    fn connect(&self) {
        self.calls.lock().push("connect");
    }

    fn answer(&self) {
        self.calls.lock().push("answer");
    }

    fn hangup(&self) {
        self.calls.lock().push("hangup");
    }

    fn disconnect(&self) {
        self.calls.lock().push("disconnect");
    }
}

/// Hands every transport it builds to the test through a channel
pub struct FakeTransportFactory {
    handles: mpsc::UnboundedSender<FakeHandle>,
    created: AtomicUsize,
    fail_with: Option<String>,
}

impl FakeTransportFactory {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeHandle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(Self {
            handles: tx,
            created: AtomicUsize::new(0),
            fail_with: None,
        });
        (factory, rx)
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            handles: tx,
            created: AtomicUsize::new(0),
            fail_with: Some(reason.to_string()),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(
        &self,
        target: &SignalingTarget,
        credential: &Credential,
    ) -> ClientResult<(Box<dyn SessionTransport>, mpsc::Receiver<TransportEvent>)> {
        if let Some(reason) = &self.fail_with {
            return Err(ClientError::transport(reason.clone()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let _ = self.handles.send(FakeHandle {
            token: credential.token().to_string(),
            url: target.url_with_token(credential).to_string(),
            events: tx,
            calls: calls.clone(),
        });
        Ok((Box::new(FakeTransport { calls }), rx))
    }
}

/// Records every notification as a short string
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<String>>,
    changed: Notify,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            loop {
                let changed = self.changed.notified();
                if self.seen.lock().len() >= count {
                    return;
                }
                changed.await;
            }
        })
        .await
        .expect("handler did not receive enough notifications");
    }

    fn record(&self, entry: String) {
        self.seen.lock().push(entry);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl CallEventHandler for RecordingHandler {
    async fn on_connect(&self) {
        self.record("connect".to_string());
    }

    async fn on_disconnect(&self) {
        self.record("disconnect".to_string());
    }

    async fn on_ring(&self) {
        self.record("ring".to_string());
    }

    async fn on_hangup(&self, reason: HangupReason) {
        self.record(format!("hangup:{}", reason));
    }

    async fn on_error(&self, detail: ErrorDetail) {
        self.record(format!("error:{}", detail.kind));
    }
}

pub fn controller(
    issuer: Arc<dyn TokenIssuer>,
    factory: Arc<dyn TransportFactory>,
    config: ControllerConfig,
) -> CallController {
    let target = SignalingTarget::new("pbx.test", &config.signaling).unwrap();
    CallController::new(config, target, issuer, factory).unwrap()
}

pub async fn next_event(events: &mut EventStream) -> ControllerEvent {
    tokio::time::timeout(WAIT, events.next())
        .await
        .expect("no notification in time")
        .expect("notification stream ended")
        .expect("notification stream lagged")
}

/// Assert that nothing else is published for a short while
pub async fn assert_quiet(events: &mut EventStream) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), events.next()).await {
        panic!("unexpected notification: {:?}", event);
    }
}

pub async fn next_handle(handles: &mut mpsc::UnboundedReceiver<FakeHandle>) -> FakeHandle {
    tokio::time::timeout(WAIT, handles.recv())
        .await
        .expect("no transport created in time")
        .expect("factory dropped")
}

/// Connect as `ext` and drive the transport to `Connected`
pub async fn connect_session(
    controller: &CallController,
    handles: &mut mpsc::UnboundedReceiver<FakeHandle>,
    events: &mut EventStream,
    ext: &str,
) -> FakeHandle {
    controller.request_connect(ext).unwrap();
    let handle = next_handle(handles).await;
    handle.emit(TransportEvent::Connected).await;
    assert_eq!(next_event(events).await, ControllerEvent::Connected);
    handle
}
