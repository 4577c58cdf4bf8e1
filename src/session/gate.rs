//! Half-duplex gate
//!
//! Caller input and agent speech never overlap. The gate is closed only while
//! the agent is speaking; speech during generation is still transcribed and
//! handled once the turn completes. The arbiter is the only writer; the
//! capture forwarder and tests observe through a `watch` receiver.

use tokio::sync::watch;

/// Current phase of the turn cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// Accepting transcript events
    #[default]
    Listening,
    /// Waiting on the response generator; caller speech is still captured
    Generating,
    /// Synthesizing and playing a reply; transcript events are dropped
    Speaking,
}

impl GateState {
    /// Whether caller audio and transcripts are accepted
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Speaking)
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listening => write!(f, "listening"),
            Self::Generating => write!(f, "generating"),
            Self::Speaking => write!(f, "speaking"),
        }
    }
}

/// Owned gate that publishes every transition
#[derive(Debug)]
pub struct Gate {
    tx: watch::Sender<GateState>,
}

impl Gate {
    /// Create a gate in the `Listening` state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::Listening);
        Self { tx }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        *self.tx.borrow()
    }

    /// Move to `next`, logging the transition
    pub fn set(&self, next: GateState) {
        let prev = self.tx.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "gate transition");
        }
    }

    /// Observe gate transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
