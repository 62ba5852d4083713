pub mod types;
pub mod config;
pub mod fetcher;
pub mod date;
pub mod traits;
pub mod sources;
pub mod digest;
pub mod aggregator;
pub mod llm_adapter;
pub mod imaging;
pub mod store;
pub mod publisher;
pub mod pipeline;

pub use types::*;
pub use config::{Cli, LogFormat, NotifierConfig};
pub use fetcher::Fetcher;
pub use date::DateResolver;
pub use traits::{MenuSource, WeatherSource};
pub use aggregator::{Aggregator, MenuOutcome};
pub use llm_adapter::{Enricher, LlmAdapter};
pub use imaging::{ImageGenerator, ImageModel};
pub use store::ArtifactStore;
pub use publisher::{MessagingChannel, Publisher};
pub use pipeline::{NotificationPipeline, RunReport};
