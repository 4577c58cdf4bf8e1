//! Streaming speech-to-text listener (Deepgram live transcription)
//!
//! Adapts provider messages into [`ListenerEvent`]s and forwards them in
//! arrival order. The listener never drops or invents transcript events;
//! gating is the arbiter's job.

use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use super::SAMPLE_RATE;
use crate::config::SttConfig;
use crate::session::{ListenerEvent, TranscriptEvent};
use crate::{Error, Result};

/// Deepgram live transcription endpoint
const LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Provider message envelope
#[derive(serde::Deserialize)]
#[serde(tag = "type")]
enum DeepgramMessage {
    Results(DeepgramResults),
    UtteranceEnd {},
    SpeechStarted {},
    Metadata {},
    Error {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
    channel: DeepgramChannel,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Outbound traffic to the provider
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outbound {
    Audio(Vec<u8>),
    KeepAlive,
    Close,
}

/// Parse one provider text message
///
/// Returns `Ok(None)` for messages that carry no turn-taking information
/// (metadata, speech-started notifications, unknown types).
///
/// # Errors
///
/// Returns error if the message is not valid JSON for a known shape
pub fn parse_message(text: &str) -> Result<Option<ListenerEvent>> {
    let message: DeepgramMessage = serde_json::from_str(text)?;

    let event = match message {
        DeepgramMessage::Results(results) => {
            let text = results
                .channel
                .alternatives
                .into_iter()
                .next()
                .map(|a| a.transcript)
                .unwrap_or_default();
            Some(ListenerEvent::transcript(TranscriptEvent {
                text,
                is_final: results.is_final,
                is_utterance_final: results.is_final && results.speech_final,
            }))
        }
        // Silence-based utterance boundary without new text
        DeepgramMessage::UtteranceEnd {} => {
            Some(ListenerEvent::transcript(TranscriptEvent::utterance_final("")))
        }
        DeepgramMessage::Error {
            description,
            message,
        } => Some(ListenerEvent::Error(
            description
                .or(message)
                .unwrap_or_else(|| "unspecified provider error".to_string()),
        )),
        DeepgramMessage::SpeechStarted {} | DeepgramMessage::Metadata {} | DeepgramMessage::Unknown => {
            None
        }
    };

    Ok(event)
}

/// Build the live transcription URL for `config`
///
/// # Errors
///
/// Returns error if the URL cannot be constructed
pub fn listen_url(config: &SttConfig) -> Result<url::Url> {
    let sample_rate = SAMPLE_RATE.to_string();
    let utterance_end_ms = config.utterance_end_ms.to_string();
    let endpointing_ms = config.endpointing_ms.to_string();

    url::Url::parse_with_params(
        LISTEN_URL,
        &[
            ("model", config.model.as_str()),
            ("language", config.language.as_str()),
            ("smart_format", if config.smart_format { "true" } else { "false" }),
            ("encoding", "linear16"),
            ("channels", "1"),
            ("sample_rate", sample_rate.as_str()),
            ("interim_results", "true"),
            ("utterance_end_ms", utterance_end_ms.as_str()),
            ("vad_events", "true"),
            ("endpointing", endpointing_ms.as_str()),
            ("no_delay", "true"),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid transcription URL: {e}")))
}

/// Sending half of an open transcription stream
#[derive(Clone)]
pub struct ListenerHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ListenerHandle {
    /// Handle wired to a bare channel instead of a socket
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { outbound }, rx)
    }

    /// Queue a chunk of linear16 audio
    ///
    /// # Errors
    ///
    /// Returns error if the stream has closed
    pub fn send_audio(&self, pcm: Vec<u8>) -> Result<()> {
        if pcm.is_empty() {
            return Ok(());
        }
        self.send(Outbound::Audio(pcm))
    }

    /// Keep the stream open while no audio is being sent
    ///
    /// # Errors
    ///
    /// Returns error if the stream has closed
    pub fn keep_alive(&self) -> Result<()> {
        self.send(Outbound::KeepAlive)
    }

    /// Ask the provider to flush and close the stream
    pub fn finish(&self) {
        // Already closed is fine
        let _ = self.outbound.send(Outbound::Close);
    }

    fn send(&self, message: Outbound) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| Error::Connection("transcription stream closed".to_string()))
    }
}

/// Deepgram live transcription connection
pub struct TranscriptionListener;

impl TranscriptionListener {
    /// Open the stream
    ///
    /// The first event on the returned receiver is always
    /// [`ListenerEvent::Open`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the websocket cannot be opened
    pub async fn connect(
        config: &SttConfig,
        api_key: &SecretString,
    ) -> Result<(ListenerHandle, mpsc::UnboundedReceiver<ListenerEvent>)> {
        let url = listen_url(config)?;
        tracing::info!(model = %config.model, language = %config.language, "connecting to transcription stream");

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Connection(format!("invalid websocket request: {e}")))?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", api_key.expose_secret())
                .parse()
                .map_err(|e| Error::Config(format!("invalid Deepgram API key: {e}")))?,
        );

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Connection(format!("failed to open transcription stream: {e}")))?;

        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ListenerEvent>();

        // Receiver is still held by us, so this cannot fail
        let _ = event_tx.send(ListenerEvent::Open);
        tracing::info!("transcription stream open");

        tokio::spawn(async move {
            let mut chunks: u64 = 0;
            while let Some(message) = outbound_rx.recv().await {
                let frame = match message {
                    Outbound::Audio(pcm) => {
                        chunks += 1;
                        if chunks == 1 || chunks % 500 == 0 {
                            tracing::trace!(chunks, "streaming audio");
                        }
                        Message::Binary(pcm.into())
                    }
                    Outbound::KeepAlive => Message::Text(r#"{"type":"KeepAlive"}"#.into()),
                    Outbound::Close => {
                        tracing::debug!("closing transcription stream");
                        let _ = sink.send(Message::Text(r#"{"type":"CloseStream"}"#.into())).await;
                        break;
                    }
                };
                if let Err(e) = sink.send(frame).await {
                    tracing::warn!(error = %e, "transcription send failed");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => match parse_message(text.as_str()) {
                        Ok(Some(event)) => event,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "unrecognized transcription message");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::info!(frame = ?frame, "transcription stream closed by provider");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => ListenerEvent::Error(e.to_string()),
                };

                let is_error = matches!(event, ListenerEvent::Error(_));
                if event_tx.send(event).is_err() || is_error {
                    return;
                }
            }
            let _ = event_tx.send(ListenerEvent::Close);
        });

        Ok((
            ListenerHandle {
                outbound: outbound_tx,
            },
            event_rx,
        ))
    }
}
