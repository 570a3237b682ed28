//! Typed connection events and the lifecycle state.

use std::fmt;

use parley_core::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of the push-channel connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket, or the last one closed.
    #[default]
    Disconnected,
    /// A socket open is in flight.
    Connecting,
    /// The socket is open and rooms have been replayed.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Subscription category. One per [`ConnectionEvent`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// [`ConnectionEvent::Connected`].
    Connected,
    /// [`ConnectionEvent::Disconnected`].
    Disconnected,
    /// [`ConnectionEvent::Error`].
    Error,
    /// [`ConnectionEvent::Message`].
    Message,
}

impl EventCategory {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Message => "message",
        }
    }
}

/// Error taxonomy surfaced to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A malformed inbound frame. The connection stays open.
    Protocol,
    /// The socket failed to open or failed while open.
    Transport,
    /// The reconnect budget ran out. Terminal until reset.
    ExhaustedRetries,
}

/// Progress report for a background job, carried by `status_update` frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Room the update belongs to.
    pub room_id: RoomId,
    /// Job status (`queued`, `running`, `done`, …) as reported by the server.
    pub status: String,
    /// Completion percentage, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Any additional fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Event delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// The socket opened and rooms were replayed.
    Connected,
    /// The socket closed.
    Disconnected {
        /// WebSocket close code (1000 for a clean close).
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// Something went wrong; see [`ErrorKind`].
    Error {
        /// Error class.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// A job status update for a joined room.
    Message(StatusUpdate),
}

impl ConnectionEvent {
    /// The category subscribers register for to receive this event.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Connected => EventCategory::Connected,
            Self::Disconnected { .. } => EventCategory::Disconnected,
            Self::Error { .. } => EventCategory::Error,
            Self::Message(_) => EventCategory::Message,
        }
    }

    pub(crate) fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}
