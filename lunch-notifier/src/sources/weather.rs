use crate::fetcher::Fetcher;
use crate::traits::WeatherSource;
use crate::types::{NotifierError, Result, TargetDate, WeatherReading, WeatherResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_WEATHER_ENDPOINT: &str = "https://wttr.in";

/// Forecast time codes kept from the hourly array, in output order.
const DAY_SLOTS: [(&str, &str); 3] = [("600", "6 AM"), ("1200", "12 PM"), ("1800", "6 PM")];

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastDocument {
    #[serde(default)]
    weather: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: String,
    #[serde(default)]
    hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
struct HourlyForecast {
    time: String,
    #[serde(rename = "tempF")]
    temp_f: String,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<DescriptionValue>,
}

#[derive(Debug, Deserialize)]
struct DescriptionValue {
    value: String,
}

/// wttr.in JSON forecast for one fixed location.
pub struct WttrWeatherSource {
    fetcher: Fetcher,
    endpoint: Url,
    location: String,
}

impl WttrWeatherSource {
    pub fn new(fetcher: Fetcher, endpoint: &str, location: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            NotifierError::Config(format!("invalid weather endpoint {endpoint}: {e}"))
        })?;
        Ok(Self {
            fetcher,
            endpoint,
            location: location.into(),
        })
    }

    pub fn forecast_url(&self) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| NotifierError::Config(format!("weather endpoint {} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .push(&self.location);
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }
}

/// Pick the day matching `date` by calendar identity and project the three
/// fixed slots in chronological order, whatever order the source used.
pub(crate) fn readings_for_day(
    source_name: &str,
    date: &TargetDate,
    document: ForecastDocument,
) -> Result<WeatherResult> {
    let matched = document.weather.into_iter().find(|day| {
        match NaiveDate::parse_from_str(day.date.trim(), "%Y-%m-%d") {
            Ok(day_date) => date.is_same_day(day_date),
            Err(e) => {
                debug!(date = %day.date, error = %e, "Skipping forecast day with unparseable date");
                false
            }
        }
    });

    let Some(day) = matched else {
        warn!(date = %date, "No weather found for date");
        return Ok(WeatherResult::no_data(date.date));
    };

    let mut readings = Vec::with_capacity(DAY_SLOTS.len());
    for (code, label) in DAY_SLOTS {
        let Some(hour) = day.hourly.iter().find(|hour| hour.time.trim() == code) else {
            debug!(date = %date, slot = label, "Forecast slot missing");
            continue;
        };

        let temperature_f = hour.temp_f.trim().parse::<i32>().map_err(|e| {
            NotifierError::malformed(source_name, format!("tempF {:?} at {label}: {e}", hour.temp_f))
        })?;
        let description = hour
            .weather_desc
            .first()
            .map(|d| d.value.trim().to_string())
            .unwrap_or_default();

        readings.push(WeatherReading {
            label: label.to_string(),
            temperature_f,
            description,
        });
    }

    Ok(WeatherResult {
        date: date.date,
        readings,
    })
}

#[async_trait]
impl WeatherSource for WttrWeatherSource {
    fn source_name(&self) -> String {
        "wttr.in weather".to_string()
    }

    async fn fetch_weather(&self, date: &TargetDate) -> Result<WeatherResult> {
        info!(date = %date, location = %self.location, "Getting weather");

        let url = self.forecast_url()?;
        let source_name = self.source_name();
        let document: ForecastDocument = self.fetcher.get_json(&source_name, url).await?;
        let result = readings_for_day(&source_name, date, document)?;

        info!(date = %date, readings = result.readings.len(), "Weather loaded");
        Ok(result)
    }
}
