//! Turn arbiter
//!
//! Owns the conversation history, the pending utterance and the half-duplex
//! gate. Listener events are handled one at a time; a completed utterance runs
//! generation, synthesis and playback to completion before the next event is
//! looked at.
//!
//! Every event carries the instant it arrived. Transcript events that arrived
//! while the agent was speaking are dropped, never replayed. Events that
//! arrived while a reply was being generated wait in the channel and are
//! handled once the turn completes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use super::{Gate, GateState, ListenerEvent, TranscriptEvent};
use crate::agent::ResponseGenerator;
use crate::conversation::{ConversationHistory, Role};
use crate::prompt::{DEFAULT_AGENT_NAME, default_greeting};
use crate::segment::speakable_segments;
use crate::voice::{AudioBuffer, AudioSegment, AudioSink, SpeechSynthesizer};
use crate::{Error, Result};

/// Default delay between the end of playback and reopening the gate
const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// What handling one listener event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Greeting spoken after the stream opened
    Greeted,
    /// Interim transcript surfaced and discarded
    Interim,
    /// Final fragment added to the pending utterance
    Buffered,
    /// Final event without text and without an utterance boundary
    Ignored,
    /// Utterance boundary with nothing buffered
    EmptyUtterance,
    /// Arrived while the agent was speaking
    Dropped,
    /// Caller turn recorded, reply generated and played
    TurnCompleted,
    /// Provider closed the stream
    Closed,
}

/// Half-duplex turn-taking state machine
pub struct TurnArbiter<G, S, P> {
    generator: G,
    synthesizer: S,
    sink: P,
    history: ConversationHistory,
    utterance: Vec<String>,
    gate: Gate,
    /// Speaking intervals, `[start, end)`, not yet passed by the event stream
    spoken: VecDeque<(Instant, Instant)>,
    greeting: String,
    settle: Duration,
    dropped: u64,
}

impl<G, S, P> TurnArbiter<G, S, P>
where
    G: ResponseGenerator,
    S: SpeechSynthesizer,
    P: AudioSink,
{
    /// Create an arbiter in the `Listening` state with an empty history
    pub fn new(generator: G, synthesizer: S, sink: P) -> Self {
        Self {
            generator,
            synthesizer,
            sink,
            history: ConversationHistory::new(),
            utterance: Vec::new(),
            gate: Gate::new(),
            spoken: VecDeque::new(),
            greeting: default_greeting(DEFAULT_AGENT_NAME),
            settle: DEFAULT_SETTLE,
            dropped: 0,
        }
    }

    /// Set the words spoken when the stream opens
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Set the delay between playback completion and reopening the gate
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[must_use]
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Observe gate transitions (used to mute the microphone while speaking)
    #[must_use]
    pub fn subscribe_gate(&self) -> watch::Receiver<GateState> {
        self.gate.subscribe()
    }

    /// Transcript events dropped by the gate so far
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Finalized fragments waiting for an utterance boundary
    #[must_use]
    pub fn pending_utterance(&self) -> &[String] {
        &self.utterance
    }

    /// Consume listener events until the stream closes
    ///
    /// # Errors
    ///
    /// Returns error on a transport failure reported by the listener or any
    /// adapter failure while generating or speaking
    pub async fn run(&mut self, events: &mut mpsc::UnboundedReceiver<ListenerEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            if self.handle(event).await? == EventOutcome::Closed {
                break;
            }
        }

        tracing::info!(
            turns = self.history.len(),
            dropped = self.dropped,
            "session ended"
        );
        Ok(())
    }

    /// Handle a single listener event
    ///
    /// # Errors
    ///
    /// Returns error on a transport failure reported by the listener or any
    /// adapter failure while generating or speaking
    pub async fn handle(&mut self, event: ListenerEvent) -> Result<EventOutcome> {
        match event {
            ListenerEvent::Open => {
                tracing::info!("stream open, greeting caller");
                let greeting = self.greeting.clone();
                self.speak(&greeting).await?;
                Ok(EventOutcome::Greeted)
            }
            ListenerEvent::Transcript { event, received_at } => {
                self.on_transcript(event, received_at).await
            }
            ListenerEvent::Close => {
                tracing::info!("transcription stream closed");
                Ok(EventOutcome::Closed)
            }
            ListenerEvent::Error(message) => {
                tracing::error!(error = %message, "transcription stream failed");
                Err(Error::Connection(message))
            }
        }
    }

    async fn on_transcript(
        &mut self,
        event: TranscriptEvent,
        received_at: Instant,
    ) -> Result<EventOutcome> {
        if !self.gate.state().is_open() || self.spoken_over(received_at) {
            self.dropped += 1;
            tracing::debug!(
                text = %event.text,
                dropped = self.dropped,
                "transcript received while agent was speaking, dropping"
            );
            return Ok(EventOutcome::Dropped);
        }

        if !event.is_final && !event.is_utterance_final {
            if !event.text.is_empty() {
                tracing::debug!(text = %event.text, "interim transcript");
            }
            return Ok(EventOutcome::Interim);
        }

        let fragment = event.text.trim();
        let buffered = event.is_final && !fragment.is_empty();
        if buffered {
            self.utterance.push(fragment.to_string());
        }

        if !event.is_utterance_final {
            return Ok(if buffered {
                EventOutcome::Buffered
            } else {
                EventOutcome::Ignored
            });
        }

        let utterance = self.utterance.join(" ");
        self.utterance.clear();

        if utterance.is_empty() {
            tracing::debug!("utterance boundary with no text, ignoring");
            return Ok(EventOutcome::EmptyUtterance);
        }

        tracing::info!(utterance = %utterance, "caller utterance");
        self.history.push(Role::User, utterance);
        self.respond().await?;
        Ok(EventOutcome::TurnCompleted)
    }

    /// Whether `received_at` falls inside a finished speaking interval
    ///
    /// Events arrive in order, so intervals that ended before this event can
    /// never match a later one and are discarded.
    fn spoken_over(&mut self, received_at: Instant) -> bool {
        while self.spoken.front().is_some_and(|&(_, end)| end <= received_at) {
            self.spoken.pop_front();
        }
        self.spoken
            .iter()
            .any(|&(start, end)| start <= received_at && received_at < end)
    }

    /// Generate a reply to the latest caller turn and speak it
    async fn respond(&mut self) -> Result<()> {
        self.gate.set(GateState::Generating);

        let reply = self.generator.generate(&self.history).await.map_err(|e| {
            tracing::error!(error = %e, "response generation failed");
            e
        })?;

        self.speak(&reply).await
    }

    /// Synthesize `text` sentence by sentence, record it, and play it
    ///
    /// The agent turn is recorded only after every segment synthesized, so a
    /// failed turn leaves no agent entry behind.
    async fn speak(&mut self, text: &str) -> Result<()> {
        self.gate.set(GateState::Speaking);
        let speaking_since = Instant::now();

        let segments = speakable_segments(text);
        let mut audio = AudioBuffer::new();
        for (order_index, segment) in segments.iter().enumerate() {
            let bytes = self.synthesizer.synthesize(segment).await.map_err(|e| {
                tracing::error!(error = %e, segment = order_index, "speech synthesis failed");
                e
            })?;
            audio.append(AudioSegment { bytes, order_index })?;
        }

        let turn = self.history.push(Role::Agent, text).sequence_index();
        tracing::info!(
            turn,
            segments = segments.len(),
            audio_bytes = audio.len(),
            reply = %text,
            "agent speaking"
        );

        self.sink.play(&audio).await.map_err(|e| {
            tracing::error!(error = %e, "playback failed");
            e
        })?;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        self.spoken.push_back((speaking_since, Instant::now()));
        self.gate.set(GateState::Listening);
        Ok(())
    }
}
