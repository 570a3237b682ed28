//! Realtime error types.

use thiserror::Error;

/// Errors from decoding an inbound frame.
///
/// These never cross the public handle; the state machine converts them to
/// [`crate::ConnectionEvent::Error`] with [`crate::ErrorKind::Protocol`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame body was not valid JSON.
    #[error("malformed frame JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// An event frame whose body was valid JSON but not an array.
    #[error("event frame body is not a JSON array")]
    NotAnArray,

    /// An event array with the wrong number of elements.
    #[error("event frame has {found} elements, expected 1 or 2")]
    Arity {
        /// Number of elements actually present.
        found: usize,
    },

    /// The first array element was not a string.
    #[error("event name must be a string")]
    EventName,

    /// A known event whose payload did not match its schema.
    #[error("invalid {event} payload: {source}")]
    Payload {
        /// The event name.
        event: String,
        /// The schema mismatch.
        #[source]
        source: serde_json::Error,
    },
}
