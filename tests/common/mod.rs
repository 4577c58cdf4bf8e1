//! Shared test utilities
//!
//! Scripted adapters standing in for the generation, synthesis and playback
//! providers. Each mock hands out a cloneable probe so tests can inspect what
//! the arbiter did after the mock has been moved into it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use turnstile::{
    AudioBuffer, AudioSink, ConversationHistory, Error, GateState, ListenerEvent, Result,
    ResponseGenerator, Role, SpeechSynthesizer, TranscriptEvent, TurnArbiter,
};

pub const GREETING: &str = "Hello! This is Gavrav. How can I help you today?";

/// Arbiter wired to the mocks with no settle delay
pub type TestArbiter = TurnArbiter<MockGenerator, MockSynthesizer, MockSink>;

/// Snapshot of the history handed to the generator
pub type SeenHistory = Vec<(Role, String)>;

/// Events delivered to the arbiter's channel from inside an adapter call
type Interjection = (mpsc::UnboundedSender<ListenerEvent>, Vec<TranscriptEvent>);

/// Generator returning scripted replies in order
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<String>>>,
    seen: Arc<Mutex<Vec<SeenHistory>>>,
    interjection: Mutex<Option<Interjection>>,
}

impl MockGenerator {
    pub fn new<I, T>(replies: I) -> (Self, Arc<Mutex<Vec<SeenHistory>>>)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::scripted(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn scripted(
        replies: impl IntoIterator<Item = Result<String>>,
    ) -> (Self, Arc<Mutex<Vec<SeenHistory>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let generator = Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Arc::clone(&seen),
            interjection: Mutex::new(None),
        };
        (generator, seen)
    }

    /// Deliver `transcript` to the arbiter's channel during the first generation
    pub fn with_interjection(
        self,
        events: mpsc::UnboundedSender<ListenerEvent>,
        transcript: Vec<TranscriptEvent>,
    ) -> Self {
        *self.interjection.lock().unwrap() = Some((events, transcript));
        self
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(&self, history: &ConversationHistory) -> Result<String> {
        let snapshot = history
            .turns()
            .iter()
            .map(|t| (t.role(), t.content().to_string()))
            .collect();
        self.seen.lock().unwrap().push(snapshot);

        let interjection = self.interjection.lock().unwrap().take();
        if let Some((events, transcript)) = interjection {
            for event in transcript {
                events.send(ListenerEvent::transcript(event)).unwrap();
            }
            // Generation takes time; keeps these stamps strictly before speaking starts
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Generation("no scripted reply".to_string())))
    }
}

/// Synthesizer that renders each sentence as `[sentence]`
pub struct MockSynthesizer {
    calls: Arc<Mutex<Vec<String>>>,
    fail_at: Option<usize>,
}

impl MockSynthesizer {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let synthesizer = Self {
            calls: Arc::clone(&calls),
            fail_at: None,
        };
        (synthesizer, calls)
    }

    /// Fail the `call`th request (zero based) with a transport error
    pub fn failing_at(call: usize) -> (Self, Arc<Mutex<Vec<String>>>) {
        let (mut synthesizer, calls) = Self::new();
        synthesizer.fail_at = Some(call);
        (synthesizer, calls)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        calls.push(text.to_string());

        if self.fail_at == Some(index) {
            return Err(Error::Upstream {
                service: "tts",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(format!("[{text}]").into_bytes())
    }
}

/// One call to [`MockSink::play`]
#[derive(Debug, Clone)]
pub struct Played {
    pub audio: String,
    pub segments: usize,
    pub gate: Option<GateState>,
    pub at: Instant,
}

/// Shared view of a [`MockSink`]
#[derive(Clone, Default)]
pub struct SinkProbe {
    played: Arc<Mutex<Vec<Played>>>,
    gate: Arc<Mutex<Option<watch::Receiver<GateState>>>>,
}

impl SinkProbe {
    /// Record the gate state seen during each playback
    pub fn watch_gate(&self, gate: watch::Receiver<GateState>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn played(&self) -> Vec<Played> {
        self.played.lock().unwrap().clone()
    }
}

/// Playback sink that records buffers instead of playing them
pub struct MockSink {
    probe: SinkProbe,
    barge_in: Option<Interjection>,
}

impl MockSink {
    pub fn new() -> (Self, SinkProbe) {
        let probe = SinkProbe::default();
        let sink = Self {
            probe: probe.clone(),
            barge_in: None,
        };
        (sink, probe)
    }

    /// Deliver `events` to the arbiter's channel while the first non-empty buffer plays
    pub fn with_barge_in(
        mut self,
        events: mpsc::UnboundedSender<ListenerEvent>,
        transcript: Vec<TranscriptEvent>,
    ) -> Self {
        self.barge_in = Some((events, transcript));
        self
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&mut self, audio: &AudioBuffer) -> Result<()> {
        let gate = self
            .probe
            .gate
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| *rx.borrow());

        self.probe.played.lock().unwrap().push(Played {
            audio: String::from_utf8_lossy(audio.as_bytes()).into_owned(),
            segments: audio.segment_count(),
            gate,
            at: Instant::now(),
        });

        if !audio.is_empty()
            && let Some((events, transcript)) = self.barge_in.take()
        {
            for event in transcript {
                events.send(ListenerEvent::transcript(event)).unwrap();
            }
        }

        // Playback takes time; keeps instants recorded here strictly earlier
        // than anything stamped after it returns
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(())
    }
}

/// Probes into the mocks owned by an arbiter
pub struct Probes {
    pub seen: Arc<Mutex<Vec<SeenHistory>>>,
    pub synthesized: Arc<Mutex<Vec<String>>>,
    pub sink: SinkProbe,
}

impl Probes {
    /// Histories the generator was called with
    pub fn seen(&self) -> Vec<SeenHistory> {
        self.seen.lock().unwrap().clone()
    }

    /// Sentences sent to the synthesizer
    pub fn synthesized(&self) -> Vec<String> {
        self.synthesized.lock().unwrap().clone()
    }
}

/// Arbiter with default mocks and the given scripted replies
pub fn arbiter<I, T>(replies: I) -> (TestArbiter, Probes)
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let (generator, seen) = MockGenerator::new(replies);
    let (synthesizer, synthesized) = MockSynthesizer::new();
    let (sink, sink_probe) = MockSink::new();
    build(
        (generator, seen),
        (synthesizer, synthesized),
        (sink, sink_probe),
    )
}

/// Wire mocks into an arbiter with no settle delay, watching its gate
pub fn build(
    (generator, seen): (MockGenerator, Arc<Mutex<Vec<SeenHistory>>>),
    (synthesizer, synthesized): (MockSynthesizer, Arc<Mutex<Vec<String>>>),
    (sink, sink_probe): (MockSink, SinkProbe),
) -> (TestArbiter, Probes) {
    let arbiter = TurnArbiter::new(generator, synthesizer, sink).with_settle(Duration::ZERO);
    sink_probe.watch_gate(arbiter.subscribe_gate());
    (
        arbiter,
        Probes {
            seen,
            synthesized,
            sink: sink_probe,
        },
    )
}

/// Transcript event stamped now
pub fn transcript(event: TranscriptEvent) -> ListenerEvent {
    ListenerEvent::transcript(event)
}
