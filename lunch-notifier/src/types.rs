// Use the interfaces crate for core types
pub use interfaces::defs::{
    Channel, ComposedArtifact, DeliveryReceipt, EnrichedMessage, Entity, MenuResult, MenuSection,
    TargetDate, WeatherReading, WeatherResult,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Lunch-Notifier/1.0".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Which menu fetches must succeed for a run to go ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MenuPolicy {
    /// The first configured entity is mandatory, the rest are best-effort.
    #[default]
    Primary,
    /// Every configured entity must produce a menu.
    All,
    /// Any single entity producing a menu is enough.
    Any,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("{source_name} unavailable{}: {message}", http_status_suffix(.status))]
    UpstreamUnavailable {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{source_name} returned a malformed response: {message}")]
    MalformedResponse { source_name: String, message: String },

    #[error("No menu items found for {entity}")]
    NoMenuData { entity: String },

    #[error("Required menu missing for {entities}")]
    NoPrimaryMenu { entities: String },

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("Image generation failed: {0}")]
    ImageGenerationFailed(String),

    #[error("Delivery over {channel} channel failed: {message}")]
    DeliveryFailed { channel: Channel, message: String },

    #[error("{stage} did not finish before the run deadline")]
    DeadlineExceeded { stage: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifierError {
    /// Map a transport-level failure (connect, timeout, body read) to the
    /// upstream it came from.
    pub fn transport(source_name: &str, err: reqwest::Error) -> Self {
        // Some request URLs embed credentials.
        let err = err.without_url();
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        NotifierError::UpstreamUnavailable {
            source_name: source_name.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    pub fn malformed(source_name: &str, message: impl Into<String>) -> Self {
        NotifierError::MalformedResponse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error stops the run before any delivery. Every other
    /// variant degrades the run instead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NotifierError::NoPrimaryMenu { .. })
    }
}

fn http_status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, NotifierError>;
