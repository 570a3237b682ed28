//! Connection state machine.
//!
//! Pure transition logic: the driver feeds an [`Input`] and performs the
//! returned [`Effect`]s in order. Nothing here touches the network or the
//! clock, which keeps every lifecycle rule testable without a socket.

use std::time::Duration;

use parley_core::RoomId;
use parley_core::constants::CLOSE_NORMAL;
use tracing::{debug, info, warn};

use crate::codec::{self, Frame};
use crate::config::RealtimeConfig;
use crate::errors::CodecError;
use crate::events::{ConnectionEvent, ConnectionState, ErrorKind, StatusUpdate};
use crate::reconnect::{ReconnectPolicy, Reconnector, Schedule};
use crate::rooms::RoomRegistry;

/// Something that happened, as seen by the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Caller asked to connect.
    Connect,
    /// Caller asked to disconnect.
    Disconnect,
    /// Caller asked to follow a room.
    Join(RoomId),
    /// Caller cleared the retry budget.
    ResetRetries,
    /// The transport finished opening.
    Opened,
    /// The transport failed to open.
    OpenFailed(String),
    /// A text frame arrived.
    Frame(String),
    /// The open transport failed.
    TransportError(String),
    /// The transport closed.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The armed retry timer fired.
    RetryTimerFired,
}

/// Work the driver must perform, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Start opening the transport.
    Open,
    /// Write a text frame.
    Send(String),
    /// Close the transport cleanly. The driver reports `Closed` afterwards.
    CloseTransport,
    /// Arm the retry timer.
    ScheduleRetry(Duration),
    /// Disarm the retry timer.
    CancelRetry,
    /// Deliver an event to subscribers.
    Emit(ConnectionEvent),
}

/// Lifecycle of a single push-channel connection.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    rooms: RoomRegistry,
    reconnect: Reconnector,
    /// An intentional close is in progress.
    closing: bool,
    reset_budget_on_connect: bool,
}

impl ConnectionMachine {
    /// Fresh machine in `Disconnected` with an empty registry.
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            rooms: RoomRegistry::new(config.room_warn_threshold),
            reconnect: Reconnector::new(ReconnectPolicy::from(config)),
            closing: false,
            reset_budget_on_connect: config.reset_budget_on_connect,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Registered rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Reconnect attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    /// Whether automatic reconnection has given up.
    pub fn is_exhausted(&self) -> bool {
        self.reconnect.is_exhausted()
    }

    /// Apply one input and return the effects to perform.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();
        match input {
            Input::Connect => self.on_connect(&mut fx),
            Input::Disconnect => self.on_disconnect(&mut fx),
            Input::Join(room) => self.on_join(room, &mut fx),
            Input::ResetRetries => {
                self.reconnect.reset();
                debug!("retry budget reset");
            }
            Input::Opened => self.on_opened(&mut fx),
            Input::OpenFailed(message) => {
                warn!(error = %message, "connection attempt failed");
                self.fail_transport(message, &mut fx);
                self.closing = false;
            }
            Input::Frame(raw) => self.on_frame(&raw, &mut fx),
            Input::TransportError(message) => {
                warn!(error = %message, "transport error");
                self.fail_transport(message, &mut fx);
            }
            Input::Closed { code, reason } => self.on_closed(code, reason, &mut fx),
            Input::RetryTimerFired => {
                self.reconnect.timer_fired();
                if self.state == ConnectionState::Disconnected && !self.reconnect.is_exhausted() {
                    info!(attempt = self.reconnect.attempts(), "reconnecting");
                    self.begin_open(&mut fx);
                }
            }
        }
        fx
    }

    // -- caller inputs --

    fn on_connect(&mut self, fx: &mut Vec<Effect>) {
        if self.state == ConnectionState::Connecting && self.closing {
            debug!("connect supersedes pending disconnect");
            self.closing = false;
            return;
        }
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "connect ignored");
            return;
        }
        if self.reconnect.is_exhausted() {
            if self.reset_budget_on_connect {
                self.reconnect.reset();
            } else {
                fx.push(Effect::Emit(self.exhausted_event()));
                return;
            }
        }
        self.begin_open(fx);
    }

    fn on_disconnect(&mut self, fx: &mut Vec<Effect>) {
        if self.reconnect.cancel() {
            fx.push(Effect::CancelRetry);
        }
        match self.state {
            ConnectionState::Connected => {
                info!("disconnecting");
                fx.push(Effect::Send(codec::SESSION_CLOSE.to_owned()));
                fx.push(Effect::CloseTransport);
                self.closing = true;
            }
            ConnectionState::Connecting => {
                debug!("disconnect requested while connecting");
                self.closing = true;
            }
            ConnectionState::Disconnected => {}
        }
    }

    fn on_join(&mut self, room: RoomId, fx: &mut Vec<Effect>) {
        let frame = codec::encode_join(&room);
        if !self.rooms.join(room) {
            return;
        }
        if self.state == ConnectionState::Connected {
            fx.push(Effect::Send(frame));
        }
    }

    // -- transport inputs --

    fn on_opened(&mut self, fx: &mut Vec<Effect>) {
        if self.closing {
            debug!("transport opened after disconnect; closing it");
            fx.push(Effect::CloseTransport);
            return;
        }
        self.state = ConnectionState::Connected;
        self.reconnect.on_connected();
        fx.extend(
            self.rooms
                .iter()
                .map(|room| Effect::Send(codec::encode_join(room))),
        );
        info!(rooms = self.rooms.len(), "connected");
        fx.push(Effect::Emit(ConnectionEvent::Connected));
    }

    fn on_frame(&mut self, raw: &str, fx: &mut Vec<Effect>) {
        match codec::decode(raw) {
            Ok(Frame::Ping) => fx.push(Effect::Send(codec::PONG.to_owned())),
            Ok(Frame::Event { name, payload }) if name == codec::STATUS_UPDATE_EVENT => {
                match serde_json::from_value::<StatusUpdate>(payload) {
                    Ok(update) => fx.push(Effect::Emit(ConnectionEvent::Message(update))),
                    Err(source) => {
                        let err = CodecError::Payload {
                            event: name,
                            source,
                        };
                        warn!(error = %err, "bad status update");
                        fx.push(Effect::Emit(ConnectionEvent::error(
                            ErrorKind::Protocol,
                            err.to_string(),
                        )));
                    }
                }
            }
            Ok(Frame::Event { name, .. }) => debug!(event = %name, "unhandled event dropped"),
            Ok(Frame::Open(_)) => debug!("session open"),
            Ok(Frame::Close) => debug!("session close from server"),
            Ok(Frame::Pong | Frame::Ignored) => {}
            Err(err) => {
                warn!(error = %err, "malformed frame");
                fx.push(Effect::Emit(ConnectionEvent::error(
                    ErrorKind::Protocol,
                    err.to_string(),
                )));
            }
        }
    }

    fn on_closed(&mut self, code: u16, reason: String, fx: &mut Vec<Effect>) {
        let intentional = std::mem::replace(&mut self.closing, false);
        self.state = ConnectionState::Disconnected;
        info!(code, reason = %reason, intentional, "disconnected");
        fx.push(Effect::Emit(ConnectionEvent::Disconnected { code, reason }));
        if !intentional && code != CLOSE_NORMAL {
            self.schedule(fx);
        }
    }

    // -- helpers --

    fn begin_open(&mut self, fx: &mut Vec<Effect>) {
        if self.reconnect.cancel() {
            fx.push(Effect::CancelRetry);
        }
        self.closing = false;
        self.state = ConnectionState::Connecting;
        fx.push(Effect::Open);
    }

    fn fail_transport(&mut self, message: String, fx: &mut Vec<Effect>) {
        self.state = ConnectionState::Disconnected;
        fx.push(Effect::Emit(ConnectionEvent::error(ErrorKind::Transport, message)));
        if !self.closing {
            self.schedule(fx);
        }
    }

    fn schedule(&mut self, fx: &mut Vec<Effect>) {
        if self.state == ConnectionState::Connecting {
            return;
        }
        match self.reconnect.schedule() {
            Schedule::Retry { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts = self.reconnect.policy().max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling reconnect"
                );
                fx.push(Effect::ScheduleRetry(delay));
            }
            Schedule::AlreadyPending => debug!("reconnect already scheduled"),
            Schedule::Exhausted => {
                warn!(
                    max_attempts = self.reconnect.policy().max_attempts,
                    "reconnect attempts exhausted"
                );
                fx.push(Effect::Emit(self.exhausted_event()));
            }
            Schedule::AlreadyExhausted => {}
        }
    }

    fn exhausted_event(&self) -> ConnectionEvent {
        ConnectionEvent::error(
            ErrorKind::ExhaustedRetries,
            format!(
                "gave up after {} reconnect attempts",
                self.reconnect.policy().max_attempts
            ),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
