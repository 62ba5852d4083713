use crate::fetcher::{check_response, decode_json};
use crate::store::ArtifactStore;
use crate::types::{ComposedArtifact, NotifierError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

pub const IMAGE_PROMPT: &str = "Generate a fun, colorful, cartoon-style illustration representing \
this school lunch menu and weather. Do not include any text in the image.";

/// Trait for generative image backends
#[async_trait]
pub trait ImageModel: Send + Sync {
    fn model_name(&self) -> String;

    /// Generate one image for `prompt`, returning the raw encoded bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GenerateContentBody {
    Stream(Vec<GenerateContentChunk>),
    Single(GenerateContentChunk),
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

impl GenerateContentBody {
    /// Decode the first inline image found across chunks, candidates and parts.
    pub(crate) fn into_image(self, source_name: &str) -> Result<Vec<u8>> {
        let chunks = match self {
            GenerateContentBody::Stream(chunks) => chunks,
            GenerateContentBody::Single(chunk) => vec![chunk],
        };

        let encoded = chunks
            .into_iter()
            .flat_map(|chunk| chunk.candidates)
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .map(|inline| inline.data)
            .ok_or_else(|| NotifierError::malformed(source_name, "response has no inline image data"))?;

        STANDARD
            .decode(encoded.trim())
            .map_err(|e| NotifierError::malformed(source_name, format!("invalid base64 image: {e}")))
    }
}

/// Gemini `streamGenerateContent` with image output.
pub struct GeminiImageModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiImageModel {
    pub fn new(client: Client, endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    fn model_name(&self) -> String {
        format!("Gemini ({})", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let source_name = self.model_name();
        let request = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"responseModalities": ["IMAGE"]}
        });

        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifierError::transport(&source_name, e))?;
        let response = check_response(&source_name, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| NotifierError::transport(&source_name, e))?;

        decode_json::<GenerateContentBody>(&source_name, &body)?.into_image(&source_name)
    }
}

/// Derives an illustration from the artifact and keeps a copy on disk.
pub struct ImageGenerator {
    model: Arc<dyn ImageModel>,
    store: ArtifactStore,
}

impl ImageGenerator {
    pub fn new(model: Arc<dyn ImageModel>, store: ArtifactStore) -> Self {
        Self { model, store }
    }

    pub fn prompt_for(artifact: &ComposedArtifact) -> String {
        format!("{IMAGE_PROMPT}\n\n{}", artifact.text)
    }

    /// Generate and persist the day's image. Failing to persist is logged
    /// only; the bytes are still returned for delivery.
    pub async fn generate(&self, artifact: &ComposedArtifact) -> Result<Vec<u8>> {
        info!(model = %self.model.model_name(), date = %artifact.date, "Generating menu image");

        let image = self
            .model
            .generate(&Self::prompt_for(artifact))
            .await
            .map_err(|e| NotifierError::ImageGenerationFailed(e.to_string()))?;
        if image.is_empty() {
            return Err(NotifierError::ImageGenerationFailed("model returned an empty image".to_string()));
        }

        if let Err(e) = self.store.write_image(&artifact.date, &image).await {
            warn!(date = %artifact.date, error = %e, "Failed to write menu image to file");
        }

        info!(date = %artifact.date, size = image.len(), "Generated menu image");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn decodes_image_from_stream_chunks() {
        let body = format!(
            r#"[
                {{"candidates": [{{"content": {{"role": "model", "parts": [{{"text": "Here you go"}}]}}}}]}},
                {{"candidates": [{{"content": {{"role": "model", "parts": [
                    {{"inlineData": {{"mimeType": "image/png", "data": "{}"}}}}
                ]}}}}]}}
            ]"#,
            encoded(b"\x89PNG-bytes")
        );
        let parsed: GenerateContentBody = decode_json("gemini", &body).unwrap();
        assert_eq!(parsed.into_image("gemini").unwrap(), b"\x89PNG-bytes".to_vec());
    }

    #[test]
    fn decodes_single_object_body() {
        let body = format!(
            r#"{{"candidates": [{{"content": {{"parts": [{{"inlineData": {{"data": "{}"}}}}]}}}}]}}"#,
            encoded(b"img")
        );
        let parsed: GenerateContentBody = decode_json("gemini", &body).unwrap();
        assert_eq!(parsed.into_image("gemini").unwrap(), b"img".to_vec());
    }

    #[test]
    fn missing_inline_data_is_malformed() {
        let body = r#"[{"candidates": [{"content": {"parts": [{"text": "no image today"}]}}]}]"#;
        let parsed: GenerateContentBody = decode_json("gemini", body).unwrap();
        assert!(matches!(parsed.into_image("gemini"), Err(NotifierError::MalformedResponse { .. })));
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let body = r#"[{"candidates": [{"content": {"parts": [{"inlineData": {"data": "%%%"}}]}}]}]"#;
        let parsed: GenerateContentBody = decode_json("gemini", body).unwrap();
        assert!(matches!(parsed.into_image("gemini"), Err(NotifierError::MalformedResponse { .. })));
    }

    #[test]
    fn request_url_names_model() {
        let model = GeminiImageModel::new(Client::new(), "https://example.com/v1beta/", "key", "img-model");
        assert_eq!(model.request_url(), "https://example.com/v1beta/models/img-model:streamGenerateContent");
    }
}
