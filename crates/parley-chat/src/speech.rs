//! Speech input seam.
//!
//! Recognition itself is external. A recognizer exposes a listening flag, a
//! live transcript and start/stop controls; the chat session treats the
//! finished transcript as ordinary typed input.

/// An external speech-to-text source.
pub trait SpeechInput: Send {
    /// Whether the recognizer is capturing.
    fn is_listening(&self) -> bool;

    /// Transcript captured so far.
    fn transcript(&self) -> String;

    /// Begin capturing. Clears any previous transcript.
    fn start(&mut self);

    /// Stop capturing. The transcript stays readable.
    fn stop(&mut self);

    /// Flip between listening and idle.
    fn toggle(&mut self) {
        if self.is_listening() {
            self.stop();
        } else {
            self.start();
        }
    }
}

/// Recognizer stand-in that accumulates fragments fed by a caller, such as
/// lines typed while "listening" in the terminal front-end.
#[derive(Debug, Default)]
pub struct BufferedSpeech {
    listening: bool,
    fragments: Vec<String>,
}

impl BufferedSpeech {
    /// Idle recognizer with an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recognized fragment. Ignored while idle.
    pub fn feed(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if self.listening && !fragment.is_empty() {
            self.fragments.push(fragment.to_owned());
        }
    }
}

impl SpeechInput for BufferedSpeech {
    fn is_listening(&self) -> bool {
        self.listening
    }

    fn transcript(&self) -> String {
        self.fragments.join(" ")
    }

    fn start(&mut self) {
        self.fragments.clear();
        self.listening = true;
    }

    fn stop(&mut self) {
        self.listening = false;
    }
}
