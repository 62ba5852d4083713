use crate::fetcher::{check_response, decode_json};
use crate::types::{ComposedArtifact, EnrichedMessage, NotifierError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://models.github.ai/inference/chat/completions";
pub const DEFAULT_TEXT_MODEL: &str = "openai/gpt-5-mini";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You rewrite a school lunch menu and weather forecast \
into a short, upbeat message for parents. Keep every school name, every menu item and every \
weather reading. Add a few fitting emoji. Use Telegram Markdown: *bold* for headings only. \
Reply with the message text alone.";

/// Trait for LLM adapters that can restyle text
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Run one chat turn: `system` as the instruction, `user` as the content.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// First choice's content, rejecting missing or blank replies.
    pub(crate) fn into_text(self, source_name: &str) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| NotifierError::malformed(source_name, "response has no message content"))
    }
}

/// OpenAI-compatible chat completions endpoint with bearer auth.
pub struct ChatCompletionsAdapter {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsAdapter {
    pub fn new(client: Client, endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmAdapter for ChatCompletionsAdapter {
    fn adapter_name(&self) -> String {
        format!("chat completions ({})", self.model)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let source_name = self.adapter_name();
        let start_time = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifierError::transport(&source_name, e))?;
        let response = check_response(&source_name, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| NotifierError::transport(&source_name, e))?;

        debug!(
            adapter = %source_name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Chat completion returned"
        );

        decode_json::<ChatResponse>(&source_name, &body)?.into_text(&source_name)
    }
}

/// Best-effort restyling of the composed artifact.
pub struct Enricher {
    adapter: Arc<dyn LlmAdapter>,
}

impl Enricher {
    pub fn new(adapter: Arc<dyn LlmAdapter>) -> Self {
        Self { adapter }
    }

    /// Restyle the artifact. Any failure is logged and the artifact text is
    /// returned verbatim, so enrichment can never block delivery.
    pub async fn enrich(&self, artifact: &ComposedArtifact) -> EnrichedMessage {
        info!(adapter = %self.adapter.adapter_name(), date = %artifact.date, "Enhancing message with AI");

        match self.adapter.complete(DEFAULT_SYSTEM_PROMPT, &artifact.text).await {
            Ok(text) => EnrichedMessage { text, enriched: true },
            Err(e) => {
                let err = NotifierError::EnrichmentFailed(e.to_string());
                warn!(date = %artifact.date, error = %err, "Falling back to unenriched message");
                Self::fallback(artifact)
            }
        }
    }

    pub fn fallback(artifact: &ComposedArtifact) -> EnrichedMessage {
        EnrichedMessage {
            text: artifact.text.clone(),
            enriched: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  Pizza day! 🍕  "}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;
        let response: ChatResponse = decode_json("chat", body).unwrap();
        assert_eq!(response.into_text("chat").unwrap(), "Pizza day! 🍕");
    }

    #[test]
    fn empty_choices_are_malformed() {
        let response: ChatResponse = decode_json("chat", r#"{"choices": []}"#).unwrap();
        assert!(matches!(response.into_text("chat"), Err(NotifierError::MalformedResponse { .. })));
    }

    #[test]
    fn blank_or_null_content_is_malformed() {
        for body in [
            r#"{"choices": [{"message": {"content": "   "}}]}"#,
            r#"{"choices": [{"message": {"content": null}}]}"#,
        ] {
            let response: ChatResponse = decode_json("chat", body).unwrap();
            assert!(response.into_text("chat").is_err(), "{body}");
        }
    }

    #[test]
    fn request_serializes_system_then_user() {
        let request = ChatRequest {
            model: DEFAULT_TEXT_MODEL,
            messages: vec![
                ChatMessage { role: "system", content: "be nice" },
                ChatMessage { role: "user", content: "menu" },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "openai/gpt-5-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "menu");
    }
}
