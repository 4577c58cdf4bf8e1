//! Voice processing module
//!
//! Microphone capture, the streaming transcription listener, speech
//! synthesis, and playback.

mod audio;
mod capture;
mod listener;
mod playback;
mod tts;

use async_trait::async_trait;

pub use audio::{AudioBuffer, AudioSegment};
pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_linear16};
#[cfg(test)]
pub(crate) use listener::Outbound;
pub use listener::{ListenerHandle, TranscriptionListener, listen_url, parse_message};
pub use playback::{AudioPlayback, TurnAudioFile, decode_mp3};
pub use tts::TextToSpeech;

use crate::Result;

/// Converts one sentence into encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize a single non-empty text segment
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the request or is unreachable
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Plays a complete audio buffer
#[async_trait]
pub trait AudioSink: Send {
    /// Play `audio`, returning only once playback has finished
    ///
    /// An empty buffer completes immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or played
    async fn play(&mut self, audio: &AudioBuffer) -> Result<()>;
}
