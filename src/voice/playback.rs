//! Audio playback to speakers
//!
//! A reply is written to a per-turn temporary file, decoded, and played on a
//! blocking thread. The call returns when the output callback has consumed
//! the last sample, not after a polling interval.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioBuffer, AudioSink};
use crate::{Error, Result};

/// Sample rate assumed when a stream has no decodable frames
const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Extra wait past the expected duration before giving up on the completion signal
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

/// Lets the device drain its final buffer before the stream is dropped
const DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Scoped audio file for one turn; deleted when dropped
pub struct TurnAudioFile {
    file: tempfile::NamedTempFile,
}

impl TurnAudioFile {
    /// Create the file in `dir` (or the system temp dir) and write `audio` to it
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn create(dir: Option<&Path>, audio: &[u8]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("turn-").suffix(".mp3");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(audio)?;
        file.flush()?;
        Ok(Self { file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Plays MP3 replies on the default output device
pub struct AudioPlayback {
    audio_dir: Option<PathBuf>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new(audio_dir: Option<PathBuf>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            audio_dir = ?audio_dir,
            "audio playback initialized"
        );

        Ok(Self { audio_dir })
    }
}

#[async_trait]
impl AudioSink for AudioPlayback {
    async fn play(&mut self, audio: &AudioBuffer) -> Result<()> {
        if audio.is_empty() {
            tracing::debug!("empty audio buffer, nothing to play");
            return Ok(());
        }

        let file = TurnAudioFile::create(self.audio_dir.as_deref(), audio.as_bytes())?;
        let path = file.path().to_path_buf();
        tracing::debug!(path = %path.display(), bytes = audio.len(), "turn audio written");

        let result = tokio::task::spawn_blocking(move || {
            let data = std::fs::read(&path)?;
            let (samples, sample_rate) = decode_mp3(&data)?;
            play_samples_blocking(samples, sample_rate)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")));

        // Removes the file whether playback succeeded or not
        drop(file);
        result?
    }
}

/// Find an output config at `sample_rate`, preferring mono
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };

    let supported = supports(1)
        .or_else(|| supports(2))
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Play mono samples, blocking until the output callback signals completion
fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let channels = usize::from(config.channels);
    let sample_count = samples.len();

    let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
    let mut done_tx = Some(done_tx);
    let mut position = 0usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    frame.fill(samples.get(position).copied().unwrap_or(0.0));
                    if position < samples.len() {
                        position += 1;
                    }
                }

                if position >= samples.len()
                    && let Some(tx) = done_tx.take()
                {
                    let _ = tx.send(());
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    #[allow(clippy::cast_precision_loss)]
    let expected = Duration::from_secs_f64(sample_count as f64 / f64::from(sample_rate));

    if done_rx.recv_timeout(expected + COMPLETION_GRACE).is_err() {
        tracing::warn!(
            expected_ms = u64::try_from(expected.as_millis()).unwrap_or(u64::MAX),
            "playback completion not signalled in time"
        );
    }

    std::thread::sleep(DRAIN_DELAY);
    drop(stream);
    tracing::debug!(samples = sample_count, sample_rate, "playback complete");

    Ok(())
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// MP3 is a sequence of self-contained frames, so the byte concatenation of
/// independently synthesized segments decodes as one stream.
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if let Ok(rate) = u32::try_from(frame.sample_rate) {
                    sample_rate.get_or_insert(rate);
                }

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            // ID3 tags and padding between concatenated segments
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_empty_input_yields_no_samples() {
        let (samples, rate) = decode_mp3(&[]).unwrap();
        assert!(samples.is_empty());
        assert_eq!(rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn empty_samples_play_immediately() {
        assert!(play_samples_blocking(Vec::new(), DEFAULT_SAMPLE_RATE).is_ok());
    }

    #[test]
    fn turn_audio_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = TurnAudioFile::create(Some(dir.path()), b"abc").unwrap();
        let path = file.path().to_path_buf();

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        assert!(path.extension().is_some_and(|ext| ext == "mp3"));

        drop(file);
        assert!(!path.exists());
    }
}
