//! # parley-core
//!
//! Foundation types and utilities shared by every Parley crate:
//!
//! - **Branded IDs**: [`RoomId`] and [`MessageId`] as newtypes for type safety
//! - **Backoff**: reconnect delay math in [`backoff`]
//! - **Logging**: `tracing` subscriber setup in [`logging`]
//! - **Constants**: package metadata and WebSocket close codes

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod ids;
pub mod logging;

pub use ids::{MessageId, RoomId};
