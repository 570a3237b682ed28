//! End-to-end tests against a real local WebSocket server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

use parley_realtime::{
    ConnectionEvent, ConnectionManager, ConnectionState, ErrorKind, EventCategory,
    RealtimeConfig, RealtimeHandle, StatusUpdate,
};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

fn config(url: String) -> RealtimeConfig {
    RealtimeConfig {
        url,
        max_attempts: 3,
        base_delay_ms: 20,
        max_delay_ms: 80,
        ..RealtimeConfig::default()
    }
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(TIMEOUT, listener.accept())
        .await
        .expect("client connects")
        .unwrap();
    accept_async(stream).await.unwrap()
}

/// Next text frame from the client, skipping control frames.
async fn next_text(ws: &mut ServerWs) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("frame arrives")
            .expect("stream open")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn push(ws: &mut ServerWs, frame: &str) {
    ws.send(Message::Text(frame.into())).await.unwrap();
}

/// Forward every event category into a channel.
fn record(handle: &RealtimeHandle) -> mpsc::UnboundedReceiver<ConnectionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for category in [
        EventCategory::Connected,
        EventCategory::Disconnected,
        EventCategory::Error,
        EventCategory::Message,
    ] {
        let tx = tx.clone();
        let _ = handle.on(category, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

/// Forward only status updates into a dedicated channel.
fn subscribe_messages(handle: &RealtimeHandle) -> mpsc::UnboundedReceiver<StatusUpdate> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = handle.on(EventCategory::Message, move |event| {
        if let ConnectionEvent::Message(update) = event {
            let _ = tx.send(update.clone());
        }
    });
    rx
}

async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>, pred: F) -> ConnectionEvent
where
    F: Fn(&ConnectionEvent) -> bool,
{
    timeout(TIMEOUT, async {
        loop {
            let event = rx.recv().await.expect("manager alive");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event")
}

fn is_connected(event: &ConnectionEvent) -> bool {
    matches!(event, ConnectionEvent::Connected)
}

#[tokio::test]
async fn join_before_connect_sends_one_join_then_delivers_updates() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);

    handle.join_room("r1");
    handle.join_room("r1");
    handle.connect();

    let mut ws = accept(&listener).await;
    assert_eq!(next_text(&mut ws).await, r#"42["join",{"room_id":"r1"}]"#);
    let _ = wait_for(&mut events, is_connected).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    push(&mut ws, r#"42["status_update",{"room_id":"r1","status":"done"}]"#).await;
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Message(_))).await;
    let ConnectionEvent::Message(update) = event else {
        unreachable!()
    };
    assert_eq!(update.room_id.as_str(), "r1");
    assert_eq!(update.status, "done");

    // The next frame after the single join is the pong.
    push(&mut ws, "2").await;
    assert_eq!(next_text(&mut ws).await, "3");

    handle.shutdown().await;
}

#[tokio::test]
async fn job_update_reaches_every_message_subscriber() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    let mut first = subscribe_messages(&handle);
    let mut second = subscribe_messages(&handle);

    handle.connect();
    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;
    handle.join_room("job-42");
    assert_eq!(next_text(&mut ws).await, r#"42["join",{"room_id":"job-42"}]"#);

    push(
        &mut ws,
        r#"42["status_update",{"room_id":"job-42","status":"done","progress":100}]"#,
    )
    .await;
    for rx in [&mut first, &mut second] {
        let update = timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(update.room_id.as_str(), "job-42");
        assert_eq!(update.status, "done");
        assert_eq!(update.progress, Some(100.0));
        assert!(update.extra.is_empty());
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_reports_protocol_error_and_stays_open() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;

    push(&mut ws, "42[broken").await;
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Error { .. })).await;
    assert!(matches!(
        event,
        ConnectionEvent::Error {
            kind: ErrorKind::Protocol,
            ..
        }
    ));
    assert_eq!(handle.state(), ConnectionState::Connected);

    push(&mut ws, r#"42["status_update",{"room_id":"x","status":"running","progress":40}]"#).await;
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Message(_))).await;
    let ConnectionEvent::Message(update) = event else {
        unreachable!()
    };
    assert_eq!(update.progress, Some(40.0));

    handle.shutdown().await;
}

#[tokio::test]
async fn abnormal_drop_reconnects_and_replays_rooms() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut first = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;
    handle.join_room("job-9");
    assert_eq!(next_text(&mut first).await, r#"42["join",{"room_id":"job-9"}]"#);

    drop(first);
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Disconnected { .. })).await;
    assert!(matches!(event, ConnectionEvent::Disconnected { code: 1006, .. }));

    let mut second = accept(&listener).await;
    assert_eq!(next_text(&mut second).await, r#"42["join",{"room_id":"job-9"}]"#);
    let _ = wait_for(&mut events, is_connected).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    handle.shutdown().await;
}

#[tokio::test]
async fn intentional_disconnect_closes_cleanly_without_retry() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;

    handle.disconnect();
    assert_eq!(next_text(&mut ws).await, "41");
    let close = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
    match close {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected close frame, got {other:?}"),
    }

    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Disconnected { .. })).await;
    assert!(matches!(event, ConnectionEvent::Disconnected { code: 1000, .. }));
    assert_eq!(handle.state(), ConnectionState::Disconnected);

    assert!(
        timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err(),
        "no reconnect after an intentional disconnect"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn server_normal_close_is_not_retried() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;
    ws.close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "maintenance".into(),
    }))
    .await
    .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Disconnected { .. })).await;
    assert_eq!(
        event,
        ConnectionEvent::Disconnected {
            code: 1000,
            reason: "maintenance".into()
        }
    );
    let reply = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
    assert!(matches!(reply, Message::Close(_)), "client completes the close handshake");
    assert!(
        timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err()
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn server_error_close_is_retried() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;
    ws.close(Some(CloseFrame {
        code: CloseCode::Error,
        reason: "oops".into(),
    }))
    .await
    .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Disconnected { .. })).await;
    assert!(matches!(event, ConnectionEvent::Disconnected { code: 1011, .. }));

    let _second = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn exhausted_budget_needs_explicit_reset() {
    let (listener, url) = listen().await;
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut transport = 0;
    loop {
        match wait_for(&mut events, |e| matches!(e, ConnectionEvent::Error { .. })).await {
            ConnectionEvent::Error {
                kind: ErrorKind::Transport,
                ..
            } => transport += 1,
            ConnectionEvent::Error {
                kind: ErrorKind::ExhaustedRetries,
                ..
            } => break,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(transport, 4);

    // A manual connect without a reset reports exhaustion again.
    handle.connect();
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Error { .. })).await;
    assert!(matches!(
        event,
        ConnectionEvent::Error {
            kind: ErrorKind::ExhaustedRetries,
            ..
        }
    ));

    let listener = TcpListener::bind(addr).await.unwrap();
    handle.reset_retries();
    handle.connect();
    let _ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_while_connected_notifies_subscribers() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut events = record(&handle);
    handle.connect();

    let mut ws = accept(&listener).await;
    let _ = wait_for(&mut events, is_connected).await;

    handle.shutdown().await;
    let event = wait_for(&mut events, |e| matches!(e, ConnectionEvent::Disconnected { .. })).await;
    assert!(matches!(event, ConnectionEvent::Disconnected { code: 1000, .. }));
    assert_eq!(next_text(&mut ws).await, "41");
}

#[tokio::test]
async fn state_changes_track_lifecycle() {
    let (listener, url) = listen().await;
    let handle = ConnectionManager::start(config(url));
    let mut states = handle.state_changes();
    handle.connect();

    let _ws = accept(&listener).await;
    timeout(
        TIMEOUT,
        states.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    handle.shutdown().await;
    assert_eq!(*states.borrow(), ConnectionState::Disconnected);
}
