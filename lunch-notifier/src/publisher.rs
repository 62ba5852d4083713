use crate::fetcher::check_response;
use crate::types::{Channel, DeliveryReceipt, NotifierError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_PARSE_MODE: &str = "Markdown";
const PHOTO_FILE_NAME: &str = "menu_image.png";

/// Trait for a messaging destination with a text and an image operation
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    fn channel_name(&self) -> String;

    async fn send_text(&self, text: &str) -> Result<()>;

    async fn send_photo(&self, png: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

/// Telegram Bot API `sendMessage` / `sendPhoto`.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    parse_mode: Option<String>,
}

impl TelegramChannel {
    pub fn new(client: Client, api_base: impl Into<String>, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            token: token.into(),
            chat_id: chat_id.into(),
            parse_mode: Some(DEFAULT_PARSE_MODE.to_string()),
        }
    }

    /// `None` sends plain text.
    pub fn with_parse_mode(mut self, parse_mode: Option<String>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    // Carries the bot token; never log the result.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base.trim_end_matches('/'), self.token, method)
    }

    async fn post_message(&self, text: &str, parse_mode: Option<&str>) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::transport("Telegram sendMessage", e))?;
        check_response("Telegram sendMessage", response).await?;
        Ok(())
    }

    fn delivery_error(&self, channel: Channel, err: NotifierError) -> NotifierError {
        NotifierError::DeliveryFailed {
            channel,
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    fn channel_name(&self) -> String {
        "Telegram".to_string()
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let sent = match self.post_message(text, self.parse_mode.as_deref()).await {
            Err(e) if self.parse_mode.is_some() && is_entity_parse_error(&e) => {
                warn!(error = %e, "Telegram rejected message markup, resending as plain text");
                self.post_message(text, None).await
            }
            other => other,
        };
        sent.map_err(|e| self.delivery_error(Channel::Text, e))
    }

    async fn send_photo(&self, png: Vec<u8>) -> Result<()> {
        let photo = Part::bytes(png)
            .file_name(PHOTO_FILE_NAME)
            .mime_str("image/png")
            .map_err(|e| self.delivery_error(Channel::Image, NotifierError::transport("Telegram sendPhoto", e)))?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.delivery_error(Channel::Image, NotifierError::transport("Telegram sendPhoto", e)))?;
        check_response("Telegram sendPhoto", response)
            .await
            .map_err(|e| self.delivery_error(Channel::Image, e))?;
        Ok(())
    }
}

/// A 400 caused by unbalanced Markdown (a stray `*` or `_` in a menu item or
/// model reply). The same text goes through in plain mode.
fn is_entity_parse_error(err: &NotifierError) -> bool {
    matches!(
        err,
        NotifierError::UpstreamUnavailable { status: Some(400), message, .. }
            if message.contains("can't parse entities")
    )
}

/// Turns channel calls into per-channel receipts. Each call stands alone;
/// a failed text delivery has no bearing on an image delivery.
#[derive(Clone)]
pub struct Publisher {
    channel: Arc<dyn MessagingChannel>,
}

impl Publisher {
    pub fn new(channel: Arc<dyn MessagingChannel>) -> Self {
        Self { channel }
    }

    pub async fn publish(&self, text: &str) -> DeliveryReceipt {
        match self.channel.send_text(text).await {
            Ok(()) => {
                info!(channel = %self.channel.channel_name(), bytes = text.len(), "Delivered text message");
                DeliveryReceipt::delivered(Channel::Text)
            }
            Err(e) => {
                error!(channel = %self.channel.channel_name(), error = %e, "Failed to send text message");
                DeliveryReceipt::failed(Channel::Text, e.to_string())
            }
        }
    }

    pub async fn publish_image(&self, png: Vec<u8>) -> DeliveryReceipt {
        let size = png.len();
        match self.channel.send_photo(png).await {
            Ok(()) => {
                info!(channel = %self.channel.channel_name(), size, "Delivered image");
                DeliveryReceipt::delivered(Channel::Image)
            }
            Err(e) => {
                error!(channel = %self.channel.channel_name(), error = %e, "Failed to send image");
                DeliveryReceipt::failed(Channel::Image, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(Client::new(), "https://api.telegram.org/", "123:abc", "-1001")
    }

    #[test]
    fn send_message_payload_shape() {
        let payload = SendMessage {
            chat_id: "-1001",
            text: "*Lunch*:\nPizza",
            parse_mode: Some("Markdown"),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "-1001");
        assert_eq!(json["text"], "*Lunch*:\nPizza");
        assert_eq!(json["parse_mode"], "Markdown");
    }

    #[test]
    fn plain_text_omits_parse_mode() {
        let payload = SendMessage {
            chat_id: "-1001",
            text: "hi",
            parse_mode: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn method_url_joins_token_and_method() {
        assert_eq!(channel().method_url("sendPhoto"), "https://api.telegram.org/bot123:abc/sendPhoto");
    }

    fn canned(status: u16, body: &str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body.to_string())
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn markup_rejection_triggers_plain_resend() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 42"}"#;
        let err = check_response("Telegram sendMessage", canned(400, body)).await.unwrap_err();
        assert!(is_entity_parse_error(&err));
    }

    #[tokio::test]
    async fn other_failures_are_not_resent() {
        let bad_chat = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = check_response("Telegram sendMessage", canned(400, bad_chat)).await.unwrap_err();
        assert!(!is_entity_parse_error(&err));

        let err = check_response("Telegram sendMessage", canned(502, "can't parse entities"))
            .await
            .unwrap_err();
        assert!(!is_entity_parse_error(&err));
    }

    #[test]
    fn parse_mode_can_be_disabled() {
        let channel = channel().with_parse_mode(None);
        assert!(channel.parse_mode.is_none());
    }
}
