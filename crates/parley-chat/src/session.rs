//! Chat session: input in, transcript out.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::constants::CLOSE_NORMAL;
use parley_core::{MessageId, RoomId};
use parley_query::{QueryApi, QueryError, QueryRequest, QueryResponse, Spreadsheet};
use parley_realtime::{ConnectionEvent, ErrorKind, RealtimeHandle};
use tracing::{debug, info, warn};

use crate::speech::SpeechInput;
use crate::transcript::{MessageBody, Role, Transcript};

/// Where job rooms get followed. Implemented by the realtime handle.
pub trait JobSubscriber: Send + Sync {
    /// Start receiving status updates for `room`.
    fn follow(&self, room: &RoomId);
}

impl JobSubscriber for RealtimeHandle {
    fn follow(&self, room: &RoomId) {
        self.join_room(room.clone());
    }
}

/// One user's conversation.
pub struct ChatSession {
    api: Arc<dyn QueryApi>,
    jobs: Arc<dyn JobSubscriber>,
    user_id: String,
    download_dir: PathBuf,
    transcript: Transcript,
    /// Live updates went down since the last successful connection.
    interrupted: bool,
}

impl ChatSession {
    /// Create a session for `user_id`.
    pub fn new(
        api: Arc<dyn QueryApi>,
        jobs: Arc<dyn JobSubscriber>,
        user_id: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            jobs,
            user_id: user_id.into(),
            download_dir: download_dir.into(),
            transcript: Transcript::new(),
            interrupted: false,
        }
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The query API this session talks to, for running a query off the
    /// input loop.
    pub fn api(&self) -> Arc<dyn QueryApi> {
        Arc::clone(&self.api)
    }

    /// Record the user's question and build its request. Blank input is
    /// ignored.
    ///
    /// The caller runs the request and hands the outcome to
    /// [`Self::answer`], so the session stays usable while it is in flight.
    pub fn ask(&mut self, text: &str) -> Option<QueryRequest> {
        let query = text.trim();
        if query.is_empty() {
            return None;
        }
        let _ = self
            .transcript
            .push(Role::User, MessageBody::Text(query.to_owned()));
        Some(QueryRequest {
            query: query.to_owned(),
            user_id: self.user_id.clone(),
        })
    }

    /// Stop dictation and record what was heard as a question.
    pub fn ask_speech(&mut self, speech: &mut dyn SpeechInput) -> Option<QueryRequest> {
        if speech.is_listening() {
            speech.stop();
        }
        let heard = speech.transcript();
        debug!(chars = heard.len(), "dictated query");
        self.ask(&heard)
    }

    /// Fold a query outcome into the transcript.
    ///
    /// Failures become an assistant message rather than an error. Returns the
    /// id of the last message appended.
    pub fn answer(&mut self, outcome: Result<QueryResponse, QueryError>) -> MessageId {
        match outcome {
            Ok(answer) => self.record_answer(answer),
            Err(e) => {
                warn!(error = %e, "query failed");
                self.assistant_text(format!("Sorry, that query failed: {e}"))
            }
        }
    }

    /// Ask a question and wait for its answer.
    pub async fn submit(&mut self, text: &str) -> Option<MessageId> {
        let request = self.ask(text)?;
        let outcome = self.api.query(&request).await;
        Some(self.answer(outcome))
    }

    /// Stop dictation, submit what was heard, and wait for the answer.
    pub async fn submit_speech(&mut self, speech: &mut dyn SpeechInput) -> Option<MessageId> {
        let request = self.ask_speech(speech)?;
        let outcome = self.api.query(&request).await;
        Some(self.answer(outcome))
    }

    /// Fold a push-channel event into the transcript.
    ///
    /// Returns the id of the message added or updated, if any.
    pub fn handle_event(&mut self, event: &ConnectionEvent) -> Option<MessageId> {
        match event {
            ConnectionEvent::Message(update) => {
                let id =
                    self.transcript
                        .update_job(&update.room_id, &update.status, update.progress);
                if id.is_none() {
                    debug!(room_id = %update.room_id, "status for unknown job");
                }
                id
            }
            ConnectionEvent::Connected => {
                if std::mem::replace(&mut self.interrupted, false) {
                    Some(self.info("Live updates restored."))
                } else {
                    None
                }
            }
            ConnectionEvent::Disconnected { code, .. } if *code != CLOSE_NORMAL => {
                self.interruption(format!("Live updates interrupted (code {code}); reconnecting."))
            }
            ConnectionEvent::Disconnected { .. } => None,
            ConnectionEvent::Error {
                kind: ErrorKind::Transport,
                message,
            } => self.interruption(format!("Connection problem: {message}")),
            ConnectionEvent::Error {
                kind: ErrorKind::ExhaustedRetries,
                ..
            } => {
                self.interrupted = true;
                Some(self.info(
                    "Live updates stopped after repeated failures. Retry the connection manually.",
                ))
            }
            ConnectionEvent::Error {
                kind: ErrorKind::Protocol,
                message,
            } => {
                debug!(error = %message, "protocol error from push channel");
                None
            }
        }
    }

    fn record_answer(&mut self, answer: QueryResponse) -> MessageId {
        match answer {
            QueryResponse::Text { message } => self.assistant_text(message),
            QueryResponse::Table(table) => {
                self.transcript.push(Role::Assistant, MessageBody::Table(table))
            }
            QueryResponse::Spreadsheet(sheet) => self.save_spreadsheet(&sheet),
            QueryResponse::Job(ticket) => {
                if let Some(note) = ticket.message {
                    let _ = self.assistant_text(note);
                }
                info!(room_id = %ticket.room_id, status = %ticket.status, "following job");
                self.jobs.follow(&ticket.room_id);
                self.transcript.push(
                    Role::Assistant,
                    MessageBody::Job {
                        room_id: ticket.room_id,
                        status: ticket.status,
                        progress: None,
                    },
                )
            }
        }
    }

    fn save_spreadsheet(&mut self, sheet: &Spreadsheet) -> MessageId {
        match sheet.save_to(&self.download_dir) {
            Ok(path) => self.transcript.push(
                Role::Assistant,
                MessageBody::Download {
                    path,
                    row_count: sheet.row_count,
                },
            ),
            Err(e) => {
                warn!(filename = %sheet.filename, error = %e, "spreadsheet not saved");
                self.assistant_text(format!("Could not save {}: {e}", sheet.filename))
            }
        }
    }

    /// Announce an outage event. Chat input stays available throughout.
    fn interruption(&mut self, text: String) -> Option<MessageId> {
        self.interrupted = true;
        Some(self.info(text))
    }

    fn assistant_text(&mut self, text: impl Into<String>) -> MessageId {
        self.transcript
            .push(Role::Assistant, MessageBody::Text(text.into()))
    }

    fn info(&mut self, text: impl Into<String>) -> MessageId {
        self.transcript.push(Role::Info, MessageBody::Text(text.into()))
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("user_id", &self.user_id)
            .field("messages", &self.transcript.len())
            .finish_non_exhaustive()
    }
}
