//! Connection manager: the tokio task that owns the WebSocket.
//!
//! [`ConnectionManager::start`] spawns one driver task and returns a cloneable
//! [`RealtimeHandle`]. The driver serializes every transition: it waits on
//! caller commands, the in-flight open, the socket, and the retry timer, feeds
//! the result to the [`ConnectionMachine`], and performs the effects before
//! polling anything else.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parley_core::RoomId;
use parley_core::constants::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RealtimeConfig;
use crate::events::{ConnectionEvent, ConnectionState, EventCategory};
use crate::fanout::{EventHub, SubscriberId};
use crate::machine::{ConnectionMachine, Effect, Input};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsError = tokio_tungstenite::tungstenite::Error;
type OpenFuture = Pin<Box<dyn Future<Output = Result<WsStream, WsError>> + Send>>;

/// Close code reported when the server closes without a status.
const CLOSE_NO_STATUS: u16 = 1005;
const CLIENT_CLOSE_REASON: &str = "client disconnect";
const SHUTDOWN_REASON: &str = "shutdown";

/// Request from a [`RealtimeHandle`] to the driver.
#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Join(RoomId),
    ResetRetries,
}

/// What woke the driver.
enum Wake {
    Command(Command),
    OpenDone(Result<WsStream, WsError>),
    Socket(Option<Result<Message, WsError>>),
    RetryTimer,
}

/// Cloneable front door to a running connection manager.
///
/// Every method is fire-and-forget: outcomes arrive as events on the
/// subscribed callbacks, never as errors here.
#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::UnboundedSender<Command>,
    hub: Arc<EventHub>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl RealtimeHandle {
    /// Open the connection. No-op when already connecting or connected.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and stop automatic reconnection.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Follow `room`'s status updates. Replayed after every reconnect.
    pub fn join_room(&self, room: impl Into<RoomId>) {
        self.send(Command::Join(room.into()));
    }

    /// Clear an exhausted retry budget so `connect()` is allowed again.
    pub fn reset_retries(&self) {
        self.send(Command::ResetRetries);
    }

    /// Register a callback for one event category.
    pub fn on<F>(&self, category: EventCategory, callback: F) -> SubscriberId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.hub.on(category, callback)
    }

    /// Remove a callback registered with [`Self::on`].
    pub fn off(&self, id: SubscriberId) -> bool {
        self.hub.off(id)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the driver and wait for it to close the socket.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut rx = self.state.clone();
        while rx.changed().await.is_ok() {}
    }

    /// Whether [`Self::shutdown`] was requested.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("connection manager stopped; command dropped");
        }
    }
}

impl std::fmt::Debug for RealtimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Driver task state. Owned by the spawned task; reach it through a
/// [`RealtimeHandle`].
pub struct ConnectionManager {
    url: String,
    machine: ConnectionMachine,
    hub: Arc<EventHub>,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    socket: Option<WsStream>,
    opening: Option<OpenFuture>,
    retry_at: Option<Instant>,
}

impl ConnectionManager {
    /// Spawn the driver task for `config`. Must be called inside a tokio
    /// runtime. The connection stays closed until [`RealtimeHandle::connect`].
    pub fn start(config: RealtimeConfig) -> RealtimeHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let hub = Arc::new(EventHub::new());
        let cancel = CancellationToken::new();

        let manager = Self {
            machine: ConnectionMachine::new(&config),
            url: config.url,
            hub: Arc::clone(&hub),
            state_tx,
            commands: cmd_rx,
            cancel: cancel.clone(),
            socket: None,
            opening: None,
            retry_at: None,
        };
        drop(tokio::spawn(manager.run()));

        RealtimeHandle {
            commands: cmd_tx,
            hub,
            state: state_rx,
            cancel,
        }
    }

    async fn run(mut self) {
        info!(url = %self.url, "connection manager started");
        loop {
            let wake = tokio::select! {
                () = self.cancel.cancelled() => break,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => break,
                },
                result = poll_open(&mut self.opening) => Wake::OpenDone(result),
                msg = next_message(&mut self.socket) => Wake::Socket(msg),
                () = retry_timer(self.retry_at) => Wake::RetryTimer,
            };
            self.wake(wake).await;
        }
        self.teardown().await;
        info!("connection manager stopped");
    }

    async fn wake(&mut self, wake: Wake) {
        let input = match wake {
            Wake::Command(cmd) => match cmd {
                Command::Connect => Input::Connect,
                Command::Disconnect => Input::Disconnect,
                Command::Join(room) => Input::Join(room),
                Command::ResetRetries => Input::ResetRetries,
            },
            Wake::OpenDone(result) => {
                self.opening = None;
                match result {
                    Ok(ws) => {
                        self.socket = Some(ws);
                        Input::Opened
                    }
                    Err(e) => Input::OpenFailed(e.to_string()),
                }
            }
            Wake::Socket(msg) => match self.on_socket(msg).await {
                Some(input) => input,
                None => return,
            },
            Wake::RetryTimer => {
                self.retry_at = None;
                Input::RetryTimerFired
            }
        };
        self.feed(input).await;
    }

    /// Translate a socket read into machine input. Transport failures queue
    /// the follow-up `Closed` through [`Self::feed`].
    async fn on_socket(&mut self, msg: Option<Result<Message, WsError>>) -> Option<Input> {
        match msg {
            Some(Ok(Message::Text(text))) => Some(Input::Frame(text.as_str().to_owned())),
            Some(Ok(Message::Close(frame))) => {
                if let Some(mut ws) = self.socket.take() {
                    // Flushes the close reply queued when the peer's frame was read.
                    match ws.close(None).await {
                        Ok(()) | Err(WsError::ConnectionClosed) => {}
                        Err(e) => debug!(error = %e, "close reply not flushed"),
                    }
                }
                let (code, reason) = match frame {
                    Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                    None => (CLOSE_NO_STATUS, String::new()),
                };
                Some(Input::Closed { code, reason })
            }
            Some(Ok(_)) => None,
            Some(Err(e)) => {
                self.socket = None;
                Some(Input::TransportError(e.to_string()))
            }
            None => {
                self.socket = None;
                Some(Input::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: "connection lost".into(),
                })
            }
        }
    }

    /// Run `input` and every input its effects produce, in order.
    async fn feed(&mut self, input: Input) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let follows_error = matches!(input, Input::TransportError(_));
            let effects = self.machine.handle(input);
            let _ = self.state_tx.send_replace(self.machine.state());
            for effect in effects {
                self.apply(effect, &mut queue).await;
            }
            if follows_error {
                queue.push_back(Input::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: String::new(),
                });
            }
        }
    }

    async fn apply(&mut self, effect: Effect, queue: &mut VecDeque<Input>) {
        match effect {
            Effect::Open => {
                debug!(url = %self.url, "opening socket");
                let url = self.url.clone();
                self.opening = Some(Box::pin(async move {
                    connect_async(url).await.map(|(ws, _response)| ws)
                }));
            }
            Effect::Send(text) => {
                let Some(ws) = self.socket.as_mut() else {
                    debug!(frame = %text, "no socket; frame dropped");
                    return;
                };
                if let Err(e) = ws.send(Message::Text(text.into())).await {
                    warn!(error = %e, "send failed");
                    self.socket = None;
                    queue.push_back(Input::TransportError(e.to_string()));
                }
            }
            Effect::CloseTransport => {
                let Some(mut ws) = self.socket.take() else {
                    return;
                };
                if let Err(e) = ws.close(Some(client_close_frame())).await {
                    debug!(error = %e, "close handshake failed");
                }
                queue.push_back(Input::Closed {
                    code: CLOSE_NORMAL,
                    reason: CLIENT_CLOSE_REASON.into(),
                });
            }
            Effect::ScheduleRetry(delay) => self.retry_at = Some(Instant::now() + delay),
            Effect::CancelRetry => self.retry_at = None,
            Effect::Emit(event) => {
                let delivered = self.hub.emit(&event);
                debug!(category = event.category().as_str(), delivered, "event emitted");
            }
        }
    }

    /// Close whatever is open. Subscribers see a final `Disconnected` when
    /// the manager was not already disconnected.
    async fn teardown(&mut self) {
        self.opening = None;
        self.retry_at = None;
        if let Some(mut ws) = self.socket.take() {
            let session_close = Message::Text(crate::codec::SESSION_CLOSE.into());
            if let Err(e) = ws.send(session_close).await {
                debug!(error = %e, "session close on shutdown failed");
            }
            if let Err(e) = ws.close(Some(client_close_frame())).await {
                debug!(error = %e, "close on shutdown failed");
            }
        }
        if self.machine.state() != ConnectionState::Disconnected {
            let _ = self.hub.emit(&ConnectionEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: SHUTDOWN_REASON.into(),
            });
        }
        let _ = self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

fn client_close_frame() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: CLIENT_CLOSE_REASON.into(),
    }
}

async fn poll_open(opening: &mut Option<OpenFuture>) -> Result<WsStream, WsError> {
    match opening {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_message(socket: &mut Option<WsStream>) -> Option<Result<Message, WsError>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn retry_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
