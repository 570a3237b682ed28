//! # parley-realtime
//!
//! Client side of the server-push channel used for background-job progress.
//!
//! - [`codec`]: text framing (`2`/`3` probes, `42[name,payload]` events)
//! - [`reconnect`]: bounded exponential backoff with a single pending timer
//! - [`rooms`]: join intent that survives reconnects
//! - [`machine`]: sans-IO connection state machine (inputs in, effects out)
//! - [`fanout`]: typed event delivery to subscribers
//! - [`manager`]: tokio driver owning the WebSocket and the retry timer
//!
//! Every transition runs on the single driver task, so the state machine
//! itself needs no locking. Failures never surface as `Err` from the public
//! handle; they arrive as [`ConnectionEvent::Error`] events.

#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod machine;
pub mod manager;
pub mod reconnect;
pub mod rooms;

pub use config::RealtimeConfig;
pub use errors::CodecError;
pub use events::{ConnectionEvent, ConnectionState, ErrorKind, EventCategory, StatusUpdate};
pub use fanout::{EventHub, SubscriberId};
pub use manager::{ConnectionManager, RealtimeHandle};
