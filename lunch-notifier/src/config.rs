use crate::imaging::{DEFAULT_IMAGE_ENDPOINT, DEFAULT_IMAGE_MODEL};
use crate::llm_adapter::{DEFAULT_CHAT_ENDPOINT, DEFAULT_TEXT_MODEL};
use crate::publisher::{DEFAULT_PARSE_MODE, DEFAULT_TELEGRAM_API};
use crate::sources::menu::{MenuQuery, DEFAULT_MENU_ENDPOINT};
use crate::sources::weather::DEFAULT_WEATHER_ENDPOINT;
use crate::types::{Entity, FetchConfig, MenuPolicy, NotifierError, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Schools notified when none are configured.
pub fn default_schools() -> Vec<Entity> {
    vec![
        Entity::new("d9edb69f-dc06-41a4-8d8d-15c3e47d812f", "Butts Road Intermediate"),
        Entity::new("6809b286-dbc7-48c1-bd22-d8db93816941", "Butts Road Primary"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command line and environment surface. Secrets are only read from here and
/// never printed.
#[derive(Parser)]
#[command(name = "lunch-notifier", version, about = "Send tomorrow's school lunch menu and weather to a chat")]
pub struct Cli {
    /// Group and channel IDs are negative, e.g. -1001675706309
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    pub chat_id: Option<String>,

    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Credential for the text model; enrichment is off without it
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub text_api_key: Option<String>,

    /// Credential for the image model; image generation is off without it
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub image_api_key: Option<String>,

    /// Log and exit without doing anything
    #[arg(long, env = "SKIP_NOTIFICATION", value_parser = FalseyValueParser::new())]
    pub skip: bool,

    /// Also notify for Saturday and Sunday menus
    #[arg(long, env = "SEND_ON_WEEKENDS", value_parser = FalseyValueParser::new())]
    pub send_on_weekends: bool,

    /// School as ID=Name; repeat for several
    #[arg(long = "school", env = "SCHOOLS", value_delimiter = ',', value_parser = parse_entity)]
    pub schools: Vec<Entity>,

    #[arg(long, env = "MENU_POLICY", value_enum, default_value_t = MenuPolicy::Primary)]
    pub menu_policy: MenuPolicy,

    #[arg(long, env = "NOTIFIER_TIMEZONE", default_value = "America/New_York", value_parser = parse_timezone)]
    pub timezone: Tz,

    #[arg(long, env = "WEATHER_LOCATION", default_value = "Chesapeake")]
    pub weather_location: String,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub timeout_seconds: u64,

    #[arg(long, env = "RUN_DEADLINE_SECONDS", default_value_t = 120)]
    pub run_deadline_seconds: u64,

    #[arg(long, env = "MENU_DIR", default_value = "menus")]
    pub menu_dir: PathBuf,

    #[arg(long, env = "IMAGE_DIR", default_value = "imgs")]
    pub image_dir: PathBuf,

    /// Run for this day (YYYY-MM-DD) instead of tomorrow
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Compose and print the message without generating an image or sending anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, env = "MENU_API_URL", default_value = DEFAULT_MENU_ENDPOINT)]
    pub menu_api_url: String,

    #[arg(long, env = "SERVING_LINE", default_value = "Main Line")]
    pub serving_line: String,

    #[arg(long, env = "MEAL_TYPE", default_value = "Lunch")]
    pub meal_type: String,

    #[arg(long, env = "GRADE", default_value = "02")]
    pub grade: String,

    #[arg(long, env = "WEATHER_API_URL", default_value = DEFAULT_WEATHER_ENDPOINT)]
    pub weather_api_url: String,

    #[arg(long, env = "CHAT_COMPLETIONS_URL", default_value = DEFAULT_CHAT_ENDPOINT)]
    pub chat_completions_url: String,

    #[arg(long, env = "TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    #[arg(long, env = "IMAGE_API_URL", default_value = DEFAULT_IMAGE_ENDPOINT)]
    pub image_api_url: String,

    #[arg(long, env = "IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API)]
    pub telegram_api_url: String,

    /// Telegram parse mode; "none" sends plain text
    #[arg(long, env = "TELEGRAM_PARSE_MODE", default_value = DEFAULT_PARSE_MODE)]
    pub parse_mode: String,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub menu: String,
    pub weather: String,
    pub chat_completions: String,
    pub image: String,
    pub telegram: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            menu: DEFAULT_MENU_ENDPOINT.to_string(),
            weather: DEFAULT_WEATHER_ENDPOINT.to_string(),
            chat_completions: DEFAULT_CHAT_ENDPOINT.to_string(),
            image: DEFAULT_IMAGE_ENDPOINT.to_string(),
            telegram: DEFAULT_TELEGRAM_API.to_string(),
        }
    }
}

/// Resolved configuration for one run.
#[derive(Clone)]
pub struct NotifierConfig {
    pub chat_id: String,
    pub telegram_token: String,
    pub text_api_key: Option<String>,
    pub image_api_key: Option<String>,
    pub skip: bool,
    pub skip_weekends: bool,
    pub dry_run: bool,
    pub entities: Vec<Entity>,
    pub menu_policy: MenuPolicy,
    pub timezone: Tz,
    pub target_date: Option<NaiveDate>,
    pub weather_location: String,
    pub fetch: FetchConfig,
    pub run_deadline: Duration,
    pub menu_dir: PathBuf,
    pub image_dir: PathBuf,
    pub menu_query: MenuQuery,
    pub endpoints: Endpoints,
    pub text_model: String,
    pub image_model: String,
    pub parse_mode: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            chat_id: String::new(),
            telegram_token: String::new(),
            text_api_key: None,
            image_api_key: None,
            skip: false,
            skip_weekends: true,
            dry_run: false,
            entities: default_schools(),
            menu_policy: MenuPolicy::default(),
            timezone: chrono_tz::America::New_York,
            target_date: None,
            weather_location: "Chesapeake".to_string(),
            fetch: FetchConfig::default(),
            run_deadline: Duration::from_secs(120),
            menu_dir: PathBuf::from("menus"),
            image_dir: PathBuf::from("imgs"),
            menu_query: MenuQuery::default(),
            endpoints: Endpoints::default(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            parse_mode: Some(DEFAULT_PARSE_MODE.to_string()),
        }
    }
}

impl NotifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.entities.is_empty() {
            return Err(NotifierError::Config("at least one school must be configured".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.entities.iter().find(|e| !seen.insert(e.id.as_str())) {
            return Err(NotifierError::Config(format!(
                "school id {} is configured more than once",
                dup.id
            )));
        }
        if !self.skip && !self.dry_run {
            if self.chat_id.trim().is_empty() {
                return Err(NotifierError::Config("TELEGRAM_CHAT_ID is required".to_string()));
            }
            if self.telegram_token.trim().is_empty() {
                return Err(NotifierError::Config("TELEGRAM_TOKEN is required".to_string()));
            }
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(NotifierError::Config("HTTP timeout must be greater than zero".to_string()));
        }
        if self.run_deadline.is_zero() {
            return Err(NotifierError::Config("run deadline must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl Cli {
    /// Resolve into a validated `NotifierConfig`. Blank credentials count as
    /// absent.
    pub fn into_config(self) -> Result<NotifierConfig> {
        let entities = if self.schools.is_empty() {
            default_schools()
        } else {
            self.schools
        };
        let parse_mode = Some(self.parse_mode.trim().to_string())
            .filter(|mode| !mode.is_empty() && !mode.eq_ignore_ascii_case("none"));

        let config = NotifierConfig {
            chat_id: self.chat_id.unwrap_or_default().trim().to_string(),
            telegram_token: self.telegram_token.unwrap_or_default().trim().to_string(),
            text_api_key: non_blank(self.text_api_key),
            image_api_key: non_blank(self.image_api_key),
            skip: self.skip,
            skip_weekends: !self.send_on_weekends,
            dry_run: self.dry_run,
            entities,
            menu_policy: self.menu_policy,
            timezone: self.timezone,
            target_date: self.date,
            weather_location: self.weather_location,
            fetch: FetchConfig {
                timeout_seconds: self.timeout_seconds,
                ..FetchConfig::default()
            },
            run_deadline: Duration::from_secs(self.run_deadline_seconds),
            menu_dir: self.menu_dir,
            image_dir: self.image_dir,
            menu_query: MenuQuery {
                serving_line: self.serving_line,
                meal_type: self.meal_type,
                grade: self.grade,
            },
            endpoints: Endpoints {
                menu: self.menu_api_url,
                weather: self.weather_api_url,
                chat_completions: self.chat_completions_url,
                image: self.image_api_url,
                telegram: self.telegram_api_url,
            },
            text_model: self.text_model,
            image_model: self.image_model,
            parse_mode,
        };

        config.validate()?;
        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse `ID=Name`.
pub fn parse_entity(raw: &str) -> std::result::Result<Entity, String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=Name, got {raw:?}"))?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() {
        return Err(format!("school id and name must both be non-empty in {raw:?}"));
    }
    Ok(Entity::new(id, name))
}

pub fn parse_timezone(raw: &str) -> std::result::Result<Tz, String> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| format!("unknown time zone {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["lunch-notifier"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_school_pairs() {
        let entity = parse_entity(" abc-123 = Butts Road Primary ").unwrap();
        assert_eq!(entity.id, "abc-123");
        assert_eq!(entity.display_name, "Butts Road Primary");

        assert!(parse_entity("no-separator").is_err());
        assert!(parse_entity("=Name").is_err());
        assert!(parse_entity("id=").is_err());
    }

    #[test]
    fn rejects_unknown_zone() {
        assert_eq!(parse_timezone("America/Chicago").unwrap(), chrono_tz::America::Chicago);
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn dry_run_needs_no_credentials() {
        let config = parse(&["--dry-run", "--school", "a=Alpha", "--school", "b=Beta"])
            .into_config()
            .unwrap();
        assert!(config.dry_run);
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.entities[1].display_name, "Beta");
        assert_eq!(config.run_deadline, Duration::from_secs(120));
    }

    #[test]
    fn delivery_requires_chat_and_token() {
        let missing_token = NotifierConfig {
            chat_id: "-1001675706309".to_string(),
            ..NotifierConfig::default()
        };
        assert!(matches!(missing_token.validate(), Err(NotifierError::Config(_))));

        let missing_chat = NotifierConfig {
            telegram_token: "t".to_string(),
            ..NotifierConfig::default()
        };
        assert!(matches!(missing_chat.validate(), Err(NotifierError::Config(_))));

        let complete = NotifierConfig {
            chat_id: "-1001675706309".to_string(),
            telegram_token: "t".to_string(),
            ..NotifierConfig::default()
        };
        assert!(complete.validate().is_ok());
        assert_eq!(complete.entities, default_schools());
    }

    #[test]
    fn negative_group_chat_id_is_accepted_as_a_value() {
        let config = parse(&[
            "--chat-id",
            "-1001675706309",
            "--telegram-token",
            "t",
            "--school",
            "a=Alpha",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.chat_id, "-1001675706309");
        assert_eq!(config.telegram_token, "t");
    }

    #[test]
    fn duplicate_school_ids_are_rejected() {
        let config = NotifierConfig {
            entities: vec![Entity::new("a", "Alpha"), Entity::new("b", "Beta"), Entity::new("a", "Alpha Again")],
            dry_run: true,
            ..NotifierConfig::default()
        };
        match config.validate() {
            Err(NotifierError::Config(message)) => assert!(message.contains("school id a")),
            other => panic!("expected a configuration error, got {other:?}"),
        }

        let result = parse(&["--dry-run", "--school", "a=Alpha", "--school", "a=Alpha Again"]).into_config();
        assert!(matches!(result, Err(NotifierError::Config(_))));
    }

    #[test]
    fn weekends_are_skipped_unless_enabled() {
        assert!(NotifierConfig::default().skip_weekends);

        let config = parse(&["--dry-run", "--school", "a=Alpha", "--send-on-weekends"])
            .into_config()
            .unwrap();
        assert!(!config.skip_weekends);
    }

    #[test]
    fn blank_credentials_disable_optional_stages() {
        let config = parse(&["--dry-run", "--text-api-key", "  ", "--parse-mode", "none"])
            .into_config()
            .unwrap();
        assert!(config.text_api_key.is_none());
        assert!(config.parse_mode.is_none());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        assert!(parse(&["--dry-run", "--timeout-seconds", "0"]).into_config().is_err());
        assert!(parse(&["--dry-run", "--run-deadline-seconds", "0"]).into_config().is_err());
    }

    #[test]
    fn empty_entity_list_is_rejected() {
        let config = NotifierConfig {
            entities: Vec::new(),
            dry_run: true,
            ..NotifierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
