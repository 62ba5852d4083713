use crate::types::{Entity, MenuResult, Result, TargetDate, WeatherResult};
use async_trait::async_trait;

/// Trait for pulling one entity's menu for a day (school cafeteria APIs, etc.)
#[async_trait]
pub trait MenuSource: Send + Sync {
    /// Human-readable name for this source, used in logs and errors
    fn source_name(&self) -> String;

    /// Fetch the menu served by `entity` on `date`.
    ///
    /// An empty menu is `NoMenuData`, never an empty success.
    async fn fetch_menu(&self, entity: &Entity, date: &TargetDate) -> Result<MenuResult>;
}

/// Trait for pulling a day's forecast
#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn source_name(&self) -> String;

    /// Fetch readings for `date`. A forecast without that day yields
    /// `WeatherResult::no_data`, not an error.
    async fn fetch_weather(&self, date: &TargetDate) -> Result<WeatherResult>;
}
