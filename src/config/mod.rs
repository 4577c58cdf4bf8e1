//! Configuration management for turnstile
//!
//! Values resolve env > TOML file > built-in default. A `.env` file in the
//! working directory is loaded into the environment first.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::prompt::{DEFAULT_AGENT_NAME, default_greeting, default_system_prompt};
use crate::retry::RetryPolicy;
use crate::{Error, Result};

pub use file::TurnstileConfigFile;

/// Session configuration
#[derive(Debug)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Streaming transcription configuration
    pub stt: SttConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// Response generation configuration
    pub llm: LlmConfig,

    /// Agent persona
    pub agent: AgentConfig,

    /// Turn-cycle timing and artifacts
    pub session: SessionConfig,

    /// Retry policy for generation and synthesis
    pub retry: RetryPolicy,
}

/// API keys for external services; both are required
#[derive(Debug)]
pub struct ApiKeys {
    /// Deepgram key (streaming STT and TTS)
    pub deepgram: SecretString,

    /// Gemini key (response generation)
    pub gemini: SecretString,
}

/// Streaming transcription configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttConfig {
    /// Model identifier (e.g. "nova-2")
    pub model: String,

    /// Language tag (e.g. "en-US")
    pub language: String,

    /// Silence before the provider emits an utterance end
    pub utterance_end_ms: u32,

    /// Silence before the provider finalizes speech
    pub endpointing_ms: u32,

    /// Provider-side punctuation and formatting
    pub smart_format: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            language: "en-US".to_string(),
            utterance_end_ms: 1000,
            endpointing_ms: 200,
            smart_format: true,
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsConfig {
    /// Voice model, fixed for the session
    pub model: String,
}

/// Response generation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,
}

/// Agent persona
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    pub greeting: String,
    pub system_prompt: String,
}

/// Turn-cycle timing and artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay after playback before the gate reopens
    pub settle: Duration,

    /// Directory for per-turn audio files (system temp dir when unset)
    pub audio_dir: Option<PathBuf>,

    /// Timeout applied to each generation and synthesis request
    pub request_timeout: Duration,

    /// Keep-alive interval while the microphone is muted
    pub keep_alive: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            audio_dir: None,
            request_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the process environment, and the TOML file
    ///
    /// `config_path` overrides the default file location.
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing or the prompt file cannot be read
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to load .env"),
        }

        let fc = file::load_config_file(config_path);
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing or the prompt file cannot be read
    pub fn from_sources(
        fc: TurnstileConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // API keys (env > toml), both required
        let api_keys = ApiKeys {
            deepgram: required_key(env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram), "DEEPGRAM_API_KEY")?,
            gemini: required_key(env("GEMINI_API_KEY").or(fc.api_keys.gemini), "GEMINI_API_KEY")?,
        };

        let stt_defaults = SttConfig::default();
        let stt = SttConfig {
            model: env("TURNSTILE_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or(stt_defaults.model),
            language: env("TURNSTILE_STT_LANGUAGE")
                .or(fc.stt.language)
                .unwrap_or(stt_defaults.language),
            utterance_end_ms: fc
                .stt
                .utterance_end_ms
                .unwrap_or(stt_defaults.utterance_end_ms),
            endpointing_ms: fc.stt.endpointing_ms.unwrap_or(stt_defaults.endpointing_ms),
            smart_format: fc.stt.smart_format.unwrap_or(stt_defaults.smart_format),
        };

        let tts = TtsConfig {
            model: env("TURNSTILE_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| "aura-helios-en".to_string()),
        };

        let llm = LlmConfig {
            model: env("TURNSTILE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gemini-1.5-pro".to_string()),
        };

        let name = env("TURNSTILE_AGENT_NAME")
            .or(fc.agent.name)
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        let system_prompt = match fc.agent.system_prompt_file {
            Some(path) => std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("failed to read system prompt {}: {e}", path.display()))
            })?,
            None => default_system_prompt(&name),
        };
        let agent = AgentConfig {
            greeting: fc.agent.greeting.unwrap_or_else(|| default_greeting(&name)),
            system_prompt,
            name,
        };

        let session_defaults = SessionConfig::default();
        let session = SessionConfig {
            settle: fc
                .session
                .settle_ms
                .map_or(session_defaults.settle, Duration::from_millis),
            audio_dir: fc.session.audio_dir,
            request_timeout: fc
                .session
                .request_timeout_secs
                .map_or(session_defaults.request_timeout, Duration::from_secs),
            keep_alive: fc
                .session
                .keep_alive_secs
                .filter(|&secs| secs > 0)
                .map_or(session_defaults.keep_alive, Duration::from_secs),
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: fc.retry.max_retries.unwrap_or(retry_defaults.max_retries),
            base_delay: fc
                .retry
                .base_delay_ms
                .map_or(retry_defaults.base_delay, Duration::from_millis),
            max_delay: fc
                .retry
                .max_delay_ms
                .map_or(retry_defaults.max_delay, Duration::from_millis),
        };

        Ok(Self {
            api_keys,
            stt,
            tts,
            llm,
            agent,
            session,
            retry,
        })
    }
}

/// Wrap a required key, rejecting missing or blank values
fn required_key(value: Option<String>, name: &str) -> Result<SecretString> {
    let key = SecretString::from(value.unwrap_or_default().trim().to_string());
    if key.expose_secret().is_empty() {
        return Err(Error::Config(format!("{name} is not set")));
    }
    Ok(key)
}
