//! # parley-chat
//!
//! The conversation layer: a [`Transcript`] of user, assistant and
//! informational messages, and a [`ChatSession`] that turns user input into
//! query calls and push-channel events into transcript updates.

#![deny(unsafe_code)]

pub mod session;
pub mod speech;
pub mod transcript;

pub use session::{ChatSession, JobSubscriber};
pub use speech::{BufferedSpeech, SpeechInput};
pub use transcript::{ChatMessage, MessageBody, Role, Transcript};
