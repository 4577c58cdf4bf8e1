//! Turnstile - half-duplex turn-taking for real-time voice agents
//!
//! A single conversational channel between a caller and an automated agent:
//! the agent listens to a streaming transcript, answers once the caller
//! finishes an utterance, and never hears itself while speaking.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  ListenerEvent  ┌──────────────┐  history  ┌───────────┐
//! │  Listener  ├────────────────►│ Turn Arbiter ├──────────►│ Generator │
//! │ (Deepgram) │   mpsc channel  │  gate + log  │◄──────────┤ (Gemini)  │
//! └─────▲──────┘                 └──────┬───────┘   reply   └───────────┘
//!       │ linear16                      │ sentences
//! ┌─────┴──────┐  muted while   ┌───────▼──────┐  buffer   ┌───────────┐
//! │ Microphone │◄───────────────┤ Synthesizer  ├──────────►│ Playback  │
//! └────────────┘  gate closed   │  (Aura TTS)  │           │  (cpal)   │
//!                               └──────────────┘           └───────────┘
//! ```

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prompt;
pub mod retry;
pub mod segment;
pub mod session;
pub mod voice;

pub use agent::{GeminiGenerator, ResponseGenerator};
pub use config::Config;
pub use conversation::{ConversationHistory, Role, Turn};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use segment::{speakable_segments, split_sentences};
pub use session::{EventOutcome, GateState, ListenerEvent, TranscriptEvent, TurnArbiter};
pub use voice::{AudioBuffer, AudioSegment, AudioSink, SpeechSynthesizer};
