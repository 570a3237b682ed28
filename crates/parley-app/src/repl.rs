//! Terminal input parsing.

/// One line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    /// A question for the query API (or a dictation fragment while listening).
    Text(String),
    /// `/connect`
    Connect,
    /// `/disconnect`
    Disconnect,
    /// `/retry`: clear the retry budget and connect.
    Retry,
    /// `/status`
    Status,
    /// `/listen`: start dictation.
    Listen,
    /// `/send`: stop dictation and submit the transcript.
    Send,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// An unrecognised slash command.
    Unknown(String),
    /// Whitespace only.
    Empty,
}

/// Classify a raw input line.
pub fn parse(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Line::Text(line.to_owned());
    };
    match command.split_whitespace().next().unwrap_or_default() {
        "connect" => Line::Connect,
        "disconnect" => Line::Disconnect,
        "retry" => Line::Retry,
        "status" => Line::Status,
        "listen" => Line::Listen,
        "send" => Line::Send,
        "help" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => Line::Unknown(other.to_owned()),
    }
}

/// Command summary shown by `/help`.
pub const HELP: &str = "\
commands:
  /connect      open the live-updates channel
  /disconnect   close it and stop reconnecting
  /retry        reset the retry budget and reconnect
  /status       show the connection state
  /listen       start dictation; following lines are captured
  /send         stop dictation and ask the captured question
  /quit         leave";
