//! Turn-taking session
//!
//! The listener pushes [`ListenerEvent`]s over a single-consumer channel to
//! the [`TurnArbiter`], which owns all mutable session state.

mod arbiter;
mod events;
mod gate;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

pub use arbiter::{EventOutcome, TurnArbiter};
pub use events::{ListenerEvent, TranscriptEvent};
pub use gate::{Gate, GateState};

use crate::voice::ListenerHandle;

/// Stream microphone frames to the listener while the gate is open
///
/// Frames captured while the agent is speaking are discarded and a keep-alive
/// is sent every `keep_alive` instead, so the provider does not close an idle
/// stream. The microphone stays live while a reply is being generated.
/// Returns when either side goes away.
pub async fn forward_microphone(
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    listener: ListenerHandle,
    gate: watch::Receiver<GateState>,
    keep_alive: Duration,
) {
    let mut ticker = tokio::time::interval(keep_alive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut muted_frames: u64 = 0;

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!("microphone stream ended");
                    break;
                };
                if gate.borrow().is_open() {
                    if listener.send_audio(frame).is_err() {
                        break;
                    }
                } else {
                    muted_frames += 1;
                }
            }
            _ = ticker.tick() => {
                if !gate.borrow().is_open() && listener.keep_alive().is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(muted_frames, "microphone forwarding stopped");
}
