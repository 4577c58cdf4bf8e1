//! Gemini `generateContent` adapter

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ResponseGenerator;
use crate::conversation::ConversationHistory;
use crate::retry::{RetryPolicy, retry};
use crate::{Error, Result};

/// Gemini REST base URL
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Extract the reply text from a `generateContent` response body
///
/// Text parts of the first candidate are concatenated and trimmed.
///
/// # Errors
///
/// Returns [`Error::Generation`] if the body has no candidate (e.g. the prompt
/// was blocked) or is not valid JSON
pub fn parse_reply(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(Error::Generation(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok(text.trim().to_string())
}

/// Generates replies with a Gemini model
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    system_prompt: String,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    /// Create a generator for `model` with a fixed system instruction
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(
        api_key: SecretString,
        model: String,
        system_prompt: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            system_prompt,
            retry,
        })
    }

    async fn request(&self, transcript: &str) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: transcript }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "generation request failed");
                e
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Upstream {
                service: "generation",
                status: status.as_u16(),
                body,
            });
        }

        parse_reply(&body)
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(&self, history: &ConversationHistory) -> Result<String> {
        let transcript = history.format_transcript(&self.system_prompt);
        tracing::debug!(turns = history.len(), model = %self.model, "generating reply");

        let reply = retry(&self.retry, "generation", || self.request(&transcript)).await?;

        tracing::debug!(reply_len = reply.len(), "reply generated");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"Sure thing. "},{"text":"What amount?\n"}]}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Sure thing. What amount?");
    }

    #[test]
    fn candidate_without_text_is_empty_reply() {
        let body = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "");
    }

    #[test]
    fn blocked_prompt_is_generation_error() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        match parse_reply(body) {
            Err(Error::Generation(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_response_is_generation_error() {
        assert!(matches!(parse_reply("{}"), Err(Error::Generation(_))));
    }

    #[test]
    fn malformed_body_is_serialization_error() {
        assert!(matches!(parse_reply("<html>"), Err(Error::Serialization(_))));
    }

    #[test]
    fn request_serializes_single_user_content() {
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents":[{"role":"user","parts":[{"text":"hi"}]}]})
        );
    }

    #[test]
    fn rejects_empty_api_key() {
        let result = GeminiGenerator::new(
            SecretString::from(String::new()),
            "gemini-1.5-pro".to_string(),
            String::new(),
            Duration::from_secs(30),
            RetryPolicy::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
