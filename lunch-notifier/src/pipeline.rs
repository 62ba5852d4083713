use crate::aggregator::{Aggregator, MenuOutcome};
use crate::config::NotifierConfig;
use crate::date::DateResolver;
use crate::fetcher::Fetcher;
use crate::imaging::{GeminiImageModel, ImageGenerator};
use crate::llm_adapter::{ChatCompletionsAdapter, Enricher};
use crate::publisher::{Publisher, TelegramChannel};
use crate::sources::{SchoolCafeMenuSource, WttrWeatherSource};
use crate::store::ArtifactStore;
use crate::traits::{MenuSource, WeatherSource};
use crate::types::{
    ComposedArtifact, DeliveryReceipt, EnrichedMessage, NotifierError, Result, TargetDate,
    WeatherResult,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(120);

/// Everything one run produced. `receipts` holds one entry per channel
/// actually attempted.
#[derive(Debug)]
pub struct RunReport {
    pub date: TargetDate,
    pub artifact: ComposedArtifact,
    pub message: EnrichedMessage,
    pub receipts: Vec<DeliveryReceipt>,
}

impl RunReport {
    pub fn all_delivered(&self) -> bool {
        self.receipts.iter().all(|r| r.success)
    }
}

/// One notification cycle: fetch, compose, enrich/illustrate, deliver.
pub struct NotificationPipeline {
    resolver: DateResolver,
    aggregator: Aggregator,
    menu_source: Arc<dyn MenuSource>,
    weather_source: Option<Arc<dyn WeatherSource>>,
    enricher: Option<Enricher>,
    image_generator: Option<ImageGenerator>,
    publisher: Publisher,
    store: ArtifactStore,
    run_deadline: Duration,
    dry_run: bool,
    skip_weekends: bool,
}

impl NotificationPipeline {
    pub fn new(
        resolver: DateResolver,
        aggregator: Aggregator,
        menu_source: Arc<dyn MenuSource>,
        publisher: Publisher,
        store: ArtifactStore,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            menu_source,
            weather_source: None,
            enricher: None,
            image_generator: None,
            publisher,
            store,
            run_deadline: DEFAULT_RUN_DEADLINE,
            dry_run: false,
            skip_weekends: true,
        }
    }

    pub fn with_weather(mut self, source: Arc<dyn WeatherSource>) -> Self {
        self.weather_source = Some(source);
        self
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_image_generator(mut self, generator: ImageGenerator) -> Self {
        self.image_generator = Some(generator);
        self
    }

    pub fn with_run_deadline(mut self, run_deadline: Duration) -> Self {
        self.run_deadline = run_deadline;
        self
    }

    /// Compose and enrich only: no image generation and no delivery.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether a scheduled run for a Saturday or Sunday is skipped.
    pub fn with_skip_weekends(mut self, skip_weekends: bool) -> Self {
        self.skip_weekends = skip_weekends;
        self
    }

    /// Wire the production sources, models and channel from configuration.
    /// Enrichment and image generation are enabled by their credentials.
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.fetch.clone())?;
        let client = fetcher.client().clone();
        let store = ArtifactStore::new(&config.menu_dir, &config.image_dir);

        let menu_source = SchoolCafeMenuSource::new(
            fetcher.clone(),
            &config.endpoints.menu,
            config.menu_query.clone(),
        )?;
        let weather_source =
            WttrWeatherSource::new(fetcher, &config.endpoints.weather, &config.weather_location)?;
        let channel = TelegramChannel::new(
            client.clone(),
            &config.endpoints.telegram,
            &config.telegram_token,
            &config.chat_id,
        )
        .with_parse_mode(config.parse_mode.clone());

        let mut pipeline = Self::new(
            DateResolver::new(config.timezone),
            Aggregator::new(config.entities.clone(), config.menu_policy),
            Arc::new(menu_source),
            Publisher::new(Arc::new(channel)),
            store.clone(),
        )
        .with_weather(Arc::new(weather_source))
        .with_run_deadline(config.run_deadline)
        .with_dry_run(config.dry_run)
        .with_skip_weekends(config.skip_weekends);

        match &config.text_api_key {
            Some(key) => {
                let adapter = ChatCompletionsAdapter::new(
                    client.clone(),
                    &config.endpoints.chat_completions,
                    key,
                    &config.text_model,
                );
                pipeline = pipeline.with_enricher(Enricher::new(Arc::new(adapter)));
            }
            None => info!("No text model credential, messages will not be enriched"),
        }

        match &config.image_api_key {
            Some(key) => {
                let model = GeminiImageModel::new(client, &config.endpoints.image, key, &config.image_model);
                pipeline = pipeline.with_image_generator(ImageGenerator::new(Arc::new(model), store));
            }
            None => info!("No image model credential, no image will be generated"),
        }

        Ok(pipeline)
    }

    pub fn resolver(&self) -> &DateResolver {
        &self.resolver
    }

    /// Run for tomorrow in the configured zone. `None` means the day was
    /// skipped and nothing was fetched.
    pub async fn run(&self) -> Result<Option<RunReport>> {
        self.run_at(Utc::now()).await
    }

    /// Scheduled run as of `now`: resolves tomorrow, then skips weekends
    /// unless they are enabled.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<Option<RunReport>> {
        let date = self.resolver.resolve(now);
        if self.skip_weekends && date.is_weekend() {
            info!(date = %date, "Skipping weekend");
            return Ok(None);
        }
        self.run_for(date).await.map(Some)
    }

    /// Run for an explicit day, weekend or not. Returns `Err` only when
    /// composing fails, in which case nothing has been delivered.
    pub async fn run_for(&self, date: TargetDate) -> Result<RunReport> {
        let deadline = Instant::now() + self.run_deadline;
        info!(date = %date, deadline_secs = self.run_deadline.as_secs(), "Starting notification run");

        let (menus, weather) = tokio::join!(
            self.fetch_menus(&date, deadline),
            self.fetch_weather(&date, deadline)
        );

        let artifact = match self.aggregator.compose(&date, menus, weather) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(date = %date, error = %e, "Aborting run before delivery");
                return Err(e);
            }
        };

        if let Err(e) = self.store.write_text(&date, &artifact.text).await {
            warn!(date = %date, error = %e, "Failed to write menu artifact");
        }

        let (message, image) = tokio::join!(
            self.enrich(&artifact, deadline),
            self.illustrate(&artifact, deadline)
        );

        let mut receipts = Vec::new();
        if self.dry_run {
            info!(date = %date, "Dry run, skipping delivery");
        } else {
            receipts.push(self.publisher.publish(&message.text).await);
            if let Some(png) = image {
                receipts.push(self.publisher.publish_image(png).await);
            }
        }

        info!(
            date = %date,
            enriched = message.enriched,
            attempted = receipts.len(),
            delivered = receipts.iter().filter(|r| r.success).count(),
            "Notification run finished"
        );

        Ok(RunReport {
            date,
            artifact,
            message,
            receipts,
        })
    }

    async fn fetch_menus(&self, date: &TargetDate, deadline: Instant) -> Vec<MenuOutcome> {
        let fetches = self.aggregator.entities().iter().map(|entity| async move {
            let result = match timeout_at(deadline, self.menu_source.fetch_menu(entity, date)).await {
                Ok(result) => result,
                Err(_) => Err(NotifierError::DeadlineExceeded {
                    stage: format!("menu fetch for {}", entity.display_name),
                }),
            };
            if let Err(e) = &result {
                warn!(
                    source = %self.menu_source.source_name(),
                    entity = %entity.display_name,
                    date = %date,
                    error = %e,
                    "Failed to get lunch menu"
                );
            }
            MenuOutcome::new(entity.clone(), result)
        });

        join_all(fetches).await
    }

    async fn fetch_weather(&self, date: &TargetDate, deadline: Instant) -> Option<WeatherResult> {
        let source = self.weather_source.as_ref()?;

        let result = match timeout_at(deadline, source.fetch_weather(date)).await {
            Ok(result) => result,
            Err(_) => Err(NotifierError::DeadlineExceeded {
                stage: "weather fetch".to_string(),
            }),
        };

        match result {
            Ok(weather) => Some(weather),
            Err(e) => {
                warn!(source = %source.source_name(), date = %date, error = %e, "Continuing without weather");
                None
            }
        }
    }

    async fn enrich(&self, artifact: &ComposedArtifact, deadline: Instant) -> EnrichedMessage {
        let Some(enricher) = &self.enricher else {
            return Enricher::fallback(artifact);
        };

        match timeout_at(deadline, enricher.enrich(artifact)).await {
            Ok(message) => message,
            Err(_) => {
                let err = NotifierError::DeadlineExceeded {
                    stage: "enrichment".to_string(),
                };
                warn!(date = %artifact.date, error = %err, "Falling back to unenriched message");
                Enricher::fallback(artifact)
            }
        }
    }

    async fn illustrate(&self, artifact: &ComposedArtifact, deadline: Instant) -> Option<Vec<u8>> {
        if self.dry_run {
            return None;
        }
        let generator = self.image_generator.as_ref()?;

        let result = match timeout_at(deadline, generator.generate(artifact)).await {
            Ok(result) => result,
            Err(_) => Err(NotifierError::DeadlineExceeded {
                stage: "image generation".to_string(),
            }),
        };

        match result {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(date = %artifact.date, error = %e, "Continuing without image");
                None
            }
        }
    }
}
