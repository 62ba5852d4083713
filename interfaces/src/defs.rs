use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A calendar day anchored to one named time zone.
///
/// Two target dates are the same day when their calendar dates match; the
/// zone only records where the day was resolved and never takes part in
/// instant arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDate {
    pub date: NaiveDate,
    pub zone: Tz,
}

impl TargetDate {
    pub fn new(date: NaiveDate, zone: Tz) -> Self {
        Self { date, zone }
    }

    /// `MM/DD/YYYY`, the form menu APIs and the message header use.
    pub fn us_format(&self) -> String {
        self.date.format("%m/%d/%Y").to_string()
    }

    /// `YYYY-MM-DD`, used for forecast matching and file keys.
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn is_same_day(&self, other: NaiveDate) -> bool {
        self.date == other
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.iso(), self.zone)
    }
}

/// A configured institution whose menu is fetched on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub display_name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MenuResult {
    pub entity_id: String,
    pub items: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub label: String,
    pub temperature_f: i32,
    pub description: String,
}

/// Forecast readings for one day. No readings means the forecast had no
/// entry for the day, which is not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub date: NaiveDate,
    pub readings: Vec<WeatherReading>,
}

impl WeatherResult {
    pub fn no_data(date: NaiveDate) -> Self {
        Self {
            date,
            readings: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.readings.is_empty()
    }
}

/// One rendered menu block. `shared` marks the single section that stands
/// for every entity when they all serve the same menu.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSection {
    pub entity_names: Vec<String>,
    pub items: Vec<String>,
    pub shared: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComposedArtifact {
    pub date: TargetDate,
    pub sections: Vec<MenuSection>,
    pub weather: Option<WeatherResult>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedMessage {
    pub text: String,
    pub enriched: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Text,
    Image,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Text => f.write_str("text"),
            Channel::Image => f.write_str("image"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub channel: Channel,
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryReceipt {
    pub fn delivered(channel: Channel) -> Self {
        Self {
            channel,
            success: true,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.into()),
        }
    }
}

// Object style note:
// Everything here is created fresh for one notification cycle and dropped
// when the process exits. Only the artifact text and image outlive a run,
// and those live on disk keyed by `TargetDate::iso`.
