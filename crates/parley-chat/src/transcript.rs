//! Chat transcript model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parley_core::{MessageId, RoomId};
use parley_query::Table;

/// Who a message is from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Typed or dictated by the user.
    User,
    /// An answer from the query API.
    Assistant,
    /// A local notice (connection status, hints).
    Info,
}

/// What a message shows.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    /// Plain text.
    Text(String),
    /// Tabular answer.
    Table(Table),
    /// A spreadsheet saved to disk.
    Download {
        /// Where the file was written.
        path: PathBuf,
        /// Data rows, when the API reported them.
        row_count: Option<u64>,
    },
    /// A background job, updated in place as status arrives.
    Job {
        /// Room carrying the job's updates.
        room_id: RoomId,
        /// Latest status.
        status: String,
        /// Latest completion percentage.
        progress: Option<f64>,
    },
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    /// Unique, time-ordered id.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Content.
    pub body: MessageBody,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of chat messages.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id.
    pub fn push(&mut self, role: Role, body: MessageBody) -> MessageId {
        let id = MessageId::new();
        self.messages.push(ChatMessage {
            id: id.clone(),
            role,
            body,
            timestamp: Utc::now(),
        });
        id
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Look up a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Apply a status update to the job message for `room_id`.
    ///
    /// Returns the id of the updated message, or `None` when no job message
    /// follows that room. A missing `progress` keeps the previous value.
    pub fn update_job(
        &mut self,
        room_id: &RoomId,
        status: &str,
        progress: Option<f64>,
    ) -> Option<MessageId> {
        self.messages.iter_mut().rev().find_map(|m| match &mut m.body {
            MessageBody::Job {
                room_id: id,
                status: current,
                progress: pct,
            } if *id == *room_id => {
                status.clone_into(current);
                if progress.is_some() {
                    *pct = progress;
                }
                Some(m.id.clone())
            }
            _ => None,
        })
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
