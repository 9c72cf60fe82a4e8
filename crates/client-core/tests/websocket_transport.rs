//! WebSocket transport against a local tungstenite gateway

use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use webphone_auth_core::{Credential, Identity};
use webphone_client_core::{
    HangupReason, SessionTransport, SignalingConfig, SignalingTarget, TransportEvent,
    WebSocketTransport,
};

const WAIT: Duration = Duration::from_secs(5);

/// Scripted stand-in for the signaling gateway
struct Gateway {
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: mpsc::UnboundedReceiver<String>,
    request_uri: oneshot::Receiver<String>,
}

impl Gateway {
    fn send(&self, text: &str) {
        self.outgoing.send(Message::Text(text.into())).unwrap();
    }

    fn close(&self) {
        self.outgoing.send(Message::Close(None)).unwrap();
    }

    async fn received(&mut self) -> String {
        tokio::time::timeout(WAIT, self.incoming.recv())
            .await
            .expect("gateway received nothing")
            .expect("gateway connection ended")
    }
}

async fn start_gateway() -> (Gateway, SignalingTarget) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (uri_tx, uri_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(request.uri().to_string());
            Ok(response)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                Some(message) = outgoing_rx.recv() => {
                    let closing = matches!(message, Message::Close(_));
                    if write.send(message).await.is_err() || closing {
                        break;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = incoming_tx.send(text.as_str().to_string());
                    }
                    Some(Ok(Message::Close(_))) => {
                        let _ = incoming_tx.send("<close>".to_string());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
            }
        }
    });

    let config = SignalingConfig::default().with_scheme("ws").with_port(port);
    let target = SignalingTarget::new("127.0.0.1", &config).unwrap();
    let gateway = Gateway {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
        request_uri: uri_rx,
    };
    (gateway, target)
}

fn credential() -> Credential {
    let now = Utc::now();
    Credential::new(
        "tok-2001",
        Identity::new("2001").unwrap(),
        now,
        now + chrono::Duration::seconds(300),
    )
}

async fn next(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("no transport event in time")
        .expect("transport event channel closed")
}

async fn connected() -> (Gateway, WebSocketTransport, mpsc::Receiver<TransportEvent>) {
    let (gateway, target) = start_gateway().await;
    let (transport, mut events) = WebSocketTransport::new(&target, &credential());
    transport.connect();
    assert_eq!(next(&mut events).await, TransportEvent::Connected);
    (gateway, transport, events)
}

#[tokio::test]
async fn test_token_travels_in_query() {
    let (gateway, _transport, _events) = connected().await;
    let uri = gateway.request_uri.await.unwrap();
    assert_eq!(uri, "/phone?token=tok-2001");
}

#[tokio::test]
async fn test_ring_answer_and_remote_hangup() {
    let (mut gateway, transport, mut events) = connected().await;

    gateway.send("RINGING");
    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);

    transport.answer();
    assert_eq!(gateway.received().await, "ANSWER");

    gateway.send("HANGUP");
    assert_eq!(
        next(&mut events).await,
        TransportEvent::CallEnded(HangupReason::Normal)
    );

    gateway.close();
    assert!(matches!(
        next(&mut events).await,
        TransportEvent::Disconnected { reason: Some(_) }
    ));
}

#[tokio::test]
async fn test_local_reject_confirmed_by_gateway() {
    let (mut gateway, transport, mut events) = connected().await;

    gateway.send("RINGING");
    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);

    transport.hangup();
    assert_eq!(gateway.received().await, "HANGUP");
    gateway.send("HANGUP");

    assert_eq!(
        next(&mut events).await,
        TransportEvent::CallEnded(HangupReason::Rejected)
    );
}

#[tokio::test]
async fn test_unconfirmed_reject_ends_call_locally() {
    let (mut gateway, transport, mut events) = connected().await;

    gateway.send("RINGING");
    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);

    transport.hangup();
    assert_eq!(gateway.received().await, "HANGUP");

    assert_eq!(
        next(&mut events).await,
        TransportEvent::CallEnded(HangupReason::Rejected)
    );

    // A late confirmation is not reported twice
    gateway.send("HANGUP");
    gateway.send("RINGING");
    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);
}

#[tokio::test]
async fn test_busy_extension() {
    let (gateway, _transport, mut events) = connected().await;

    gateway.send("BUSY");
    gateway.close();

    assert_eq!(
        next(&mut events).await,
        TransportEvent::CallEnded(HangupReason::Busy)
    );
    assert!(matches!(
        next(&mut events).await,
        TransportEvent::Disconnected { .. }
    ));
}

#[tokio::test]
async fn test_drop_mid_call_fails_the_call() {
    let (mut gateway, transport, mut events) = connected().await;

    gateway.send("RINGING");
    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);
    transport.answer();
    assert_eq!(gateway.received().await, "ANSWER");

    gateway.close();

    assert_eq!(
        next(&mut events).await,
        TransportEvent::CallEnded(HangupReason::Failed)
    );
    assert!(matches!(
        next(&mut events).await,
        TransportEvent::Disconnected { .. }
    ));
    // Exactly once
    assert!(tokio::time::timeout(WAIT, events.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_audio_and_unknown_frames_are_ignored() {
    let (gateway, _transport, mut events) = connected().await;

    gateway
        .outgoing
        .send(Message::Binary(vec![0u8; 320].into()))
        .unwrap();
    gateway.send("MUTE");
    gateway.send("RINGING");

    assert_eq!(next(&mut events).await, TransportEvent::IncomingCall);
}

#[tokio::test]
async fn test_local_disconnect_closes_socket() {
    let (mut gateway, transport, mut events) = connected().await;

    transport.disconnect();

    assert_eq!(
        next(&mut events).await,
        TransportEvent::Disconnected { reason: None }
    );
    assert_eq!(gateway.received().await, "<close>");
}

#[tokio::test]
async fn test_dial_failure_reports_error_then_disconnected() {
    // Grab a free port and release it so nothing is listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = SignalingConfig::default().with_scheme("ws").with_port(port);
    let target = SignalingTarget::new("127.0.0.1", &config).unwrap();

    let (transport, mut events) = WebSocketTransport::new(&target, &credential());
    transport.connect();

    match next(&mut events).await {
        TransportEvent::Error(message) => {
            assert!(message.contains("127.0.0.1"));
            assert!(!message.contains("tok-2001"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
        next(&mut events).await,
        TransportEvent::Disconnected { reason: Some(_) }
    ));
}
