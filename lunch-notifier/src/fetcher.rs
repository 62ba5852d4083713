use crate::types::{FetchConfig, NotifierError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Longest slice of an error body kept in logs and error messages.
const MAX_ERROR_BODY: usize = 512;

/// Shared HTTP client for one run. Every request made through it is bounded
/// by `FetchConfig::timeout_seconds`.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| NotifierError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` and decode its JSON body into `T`.
    ///
    /// Transport failures and any status other than 200 become
    /// `UpstreamUnavailable`; a body that does not fit `T` becomes
    /// `MalformedResponse`.
    pub async fn get_json<T: DeserializeOwned>(&self, source_name: &str, url: Url) -> Result<T> {
        let start_time = Instant::now();
        debug!(source = source_name, url = %redact(&url), "Sending request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NotifierError::transport(source_name, e))?;
        let response = check_response(source_name, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| NotifierError::transport(source_name, e))?;

        info!(
            source = source_name,
            bytes = body.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Request completed"
        );

        decode_json(source_name, &body)
    }
}

/// Pass a 200 response through; turn anything else into
/// `UpstreamUnavailable` carrying the status and a truncated body.
pub async fn check_response(source_name: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!(
        "HTTP {}: {}",
        status,
        truncate(body.trim(), MAX_ERROR_BODY)
    );
    warn!(source = source_name, status = status.as_u16(), "Upstream returned non-OK status");

    Err(NotifierError::UpstreamUnavailable {
        source_name: source_name.to_string(),
        status: Some(status.as_u16()),
        message,
    })
}

pub fn decode_json<T: DeserializeOwned>(source_name: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        warn!(source = source_name, error = %e, "Failed to decode response body");
        NotifierError::malformed(source_name, e.to_string())
    })
}

/// Strip the query string before logging; some upstreams take keys there.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.query().is_some() {
        shown.set_query(Some("redacted"));
    }
    shown.to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn mock_response(status: u16, body: &str) -> Response {
        Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body.to_string())
                .unwrap(),
        )
    }

    #[derive(Debug, Deserialize)]
    struct Probe {
        name: String,
    }

    #[tokio::test]
    async fn check_response_passes_ok() {
        let resp = mock_response(200, "{}");
        assert!(check_response("probe", resp).await.is_ok());
    }

    #[tokio::test]
    async fn check_response_maps_service_unavailable() {
        let resp = mock_response(503, "down for maintenance");
        let err = check_response("probe", resp).await.unwrap_err();
        match err {
            NotifierError::UpstreamUnavailable { source_name, status, message } => {
                assert_eq!(source_name, "probe");
                assert_eq!(status, Some(503));
                assert!(message.contains("down for maintenance"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_response_rejects_other_success_codes() {
        let resp = mock_response(204, "");
        let err = check_response("probe", resp).await.unwrap_err();
        assert!(matches!(err, NotifierError::UpstreamUnavailable { status: Some(204), .. }));
    }

    #[test]
    fn decode_json_reports_malformed_body() {
        let err = decode_json::<Probe>("probe", "{\"nope\": 1}").unwrap_err();
        assert!(matches!(err, NotifierError::MalformedResponse { .. }));

        let probe: Probe = decode_json("probe", "{\"name\": \"ok\"}").unwrap();
        assert_eq!(probe.name, "ok");
    }

    #[test]
    fn redact_hides_query_string() {
        let url = Url::parse("https://example.com/api?key=secret&x=1").unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.starts_with("https://example.com/api?"));
    }

    #[test]
    fn truncate_long_bodies() {
        let long = "x".repeat(600);
        let cut = truncate(&long, MAX_ERROR_BODY);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY + 1);
    }
}
