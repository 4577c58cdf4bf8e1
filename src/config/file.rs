//! TOML configuration file loading
//!
//! Supports `~/.config/turnstile/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnstileConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Streaming transcription settings
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Speech synthesis settings
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Response generation settings
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Agent persona: name, greeting, instruction
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// Turn-cycle timing and artifacts
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Retry policy for generation and synthesis
    #[serde(default)]
    pub retry: RetryFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub deepgram: Option<String>,
    pub gemini: Option<String>,
}

/// Streaming transcription configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Model identifier (e.g. "nova-2")
    pub model: Option<String>,

    /// Language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Silence before the provider emits an utterance end
    pub utterance_end_ms: Option<u32>,

    /// Silence before the provider finalizes speech
    pub endpointing_ms: Option<u32>,

    /// Provider-side punctuation and formatting
    pub smart_format: Option<bool>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Voice model (e.g. "aura-helios-en")
    pub model: Option<String>,
}

/// Response generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gemini-1.5-pro")
    pub model: Option<String>,
}

/// Agent persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    /// Name the agent introduces itself with
    pub name: Option<String>,

    /// First words spoken when the stream opens
    pub greeting: Option<String>,

    /// File holding the system instruction
    pub system_prompt_file: Option<PathBuf>,
}

/// Session timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Delay after playback before listening resumes
    pub settle_ms: Option<u64>,

    /// Directory for per-turn audio files
    pub audio_dir: Option<PathBuf>,

    /// Timeout for generation and synthesis requests
    pub request_timeout_secs: Option<u64>,

    /// Keep-alive interval while the microphone is muted
    pub keep_alive_secs: Option<u64>,
}

/// Retry configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Load the TOML config file at `path`, or the default location
///
/// Returns `TurnstileConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> TurnstileConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return TurnstileConfigFile::default();
    };

    if !path.exists() {
        return TurnstileConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TurnstileConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TurnstileConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/turnstile/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("turnstile").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: TurnstileConfigFile = toml::from_str(
            r#"
            [stt]
            model = "nova-3"

            [session]
            settle_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(fc.stt.model.as_deref(), Some("nova-3"));
        assert_eq!(fc.session.settle_ms, Some(500));
        assert!(fc.api_keys.deepgram.is_none());
        assert!(fc.retry.max_retries.is_none());
    }

    #[test]
    fn rejects_unknown_sections() {
        let result: Result<TurnstileConfigFile, _> = toml::from_str("[voice]\nenabled = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file(Some(&dir.path().join("absent.toml")));
        assert!(fc.llm.model.is_none());
    }

    #[test]
    fn unparsable_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let fc = load_config_file(Some(&path));
        assert!(fc.tts.model.is_none());
    }

    #[test]
    fn reads_file_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tts]\nmodel = \"aura-asteria-en\"\n").unwrap();

        let fc = load_config_file(Some(&path));
        assert_eq!(fc.tts.model.as_deref(), Some("aura-asteria-en"));
    }
}
