//! Events delivered from the transcription listener to the turn arbiter

use std::time::Instant;

/// One transcript update from the streaming provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Transcript text for the span (may be empty)
    pub text: String,
    /// Text is locked and will not be revised
    pub is_final: bool,
    /// Provider endpointing decided the caller finished speaking
    pub is_utterance_final: bool,
}

impl TranscriptEvent {
    /// Provisional text that may still change
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            is_utterance_final: false,
        }
    }

    /// Locked text, caller still speaking
    #[must_use]
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            is_utterance_final: false,
        }
    }

    /// Locked text that also closes the utterance
    #[must_use]
    pub fn utterance_final(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            is_utterance_final: true,
        }
    }
}

/// Everything the listener can report, in provider order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// Stream is open; the agent should greet the caller
    Open,
    /// Transcript update, stamped with the instant it left the socket
    Transcript {
        event: TranscriptEvent,
        received_at: Instant,
    },
    /// Provider closed the stream
    Close,
    /// Transport failure reported by the provider or the socket
    Error(String),
}

impl ListenerEvent {
    /// Wrap a transcript event stamped with the current instant
    #[must_use]
    pub fn transcript(event: TranscriptEvent) -> Self {
        Self::Transcript {
            event,
            received_at: Instant::now(),
        }
    }
}
