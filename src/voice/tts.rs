//! Text-to-speech (TTS) via Deepgram Aura

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::SpeechSynthesizer;
use crate::retry::{RetryPolicy, retry};
use crate::{Error, Result};

/// Deepgram speak endpoint
const SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";

/// Synthesizes speech from text with a voice fixed for the session
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    retry: RetryPolicy,
}

impl TextToSpeech {
    /// Create a new TTS instance
    ///
    /// `model` selects both model and voice (e.g. `aura-helios-en`).
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(
        api_key: SecretString,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Deepgram API key required for TTS".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            retry,
        })
    }

    /// Voice model used for every request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeakRequest<'a> {
            text: &'a str,
        }

        let response = self
            .client
            .post(SPEAK_URL)
            .query(&[("model", self.model.as_str())])
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "TTS request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram TTS error");
            return Err(Error::Upstream {
                service: "tts",
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), model = %self.model, "synthesizing segment");

        let audio = retry(&self.retry, "tts", || self.request(text)).await?;
        if audio.is_empty() {
            return Err(Error::Tts("provider returned no audio".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "segment synthesized");
        Ok(audio)
    }
}
