use crate::fetcher::Fetcher;
use crate::traits::MenuSource;
use crate::types::{Entity, MenuResult, NotifierError, Result, TargetDate};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MENU_ENDPOINT: &str =
    "https://webapis.schoolcafe.com/api/CalendarView/GetDailyMenuitemsByGrade";

/// Fixed query parameters sent with every menu request.
#[derive(Debug, Clone)]
pub struct MenuQuery {
    pub serving_line: String,
    pub meal_type: String,
    pub grade: String,
}

impl Default for MenuQuery {
    fn default() -> Self {
        Self {
            serving_line: "Main Line".to_string(),
            meal_type: "Lunch".to_string(),
            grade: "02".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MenuResponse {
    #[serde(rename = "ENTREES", default)]
    entrees: Vec<MenuRecord>,
}

#[derive(Debug, Deserialize)]
struct MenuRecord {
    #[serde(rename = "MenuItemDescription", default)]
    description: Option<String>,
}

/// SchoolCafe daily menu API, queried per school.
pub struct SchoolCafeMenuSource {
    fetcher: Fetcher,
    endpoint: Url,
    query: MenuQuery,
}

impl SchoolCafeMenuSource {
    pub fn new(fetcher: Fetcher, endpoint: &str, query: MenuQuery) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| NotifierError::Config(format!("invalid menu endpoint {endpoint}: {e}")))?;
        Ok(Self {
            fetcher,
            endpoint,
            query,
        })
    }

    /// Build the request URL; the serving date goes out as `MM/DD/YYYY`,
    /// percent-encoded.
    pub fn menu_url(&self, entity: &Entity, date: &TargetDate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("SchoolId", &entity.id)
            .append_pair("ServingDate", &date.us_format())
            .append_pair("ServingLine", &self.query.serving_line)
            .append_pair("MealType", &self.query.meal_type)
            .append_pair("Grade", &self.query.grade)
            .append_pair("PersonId", "null");
        url
    }
}

/// Project entree descriptions into a `MenuResult`, keeping source order.
/// Blank descriptions are dropped; nothing left means `NoMenuData`.
pub(crate) fn menu_from_response(entity: &Entity, response: MenuResponse) -> Result<MenuResult> {
    let items: Vec<String> = response
        .entrees
        .into_iter()
        .filter_map(|record| record.description)
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty())
        .collect();

    if items.is_empty() {
        warn!(entity = %entity.display_name, "No menu items found");
        return Err(NotifierError::NoMenuData {
            entity: entity.display_name.clone(),
        });
    }

    for item in &items {
        debug!(entity = %entity.display_name, item = %item, "Menu item");
    }

    Ok(MenuResult {
        entity_id: entity.id.clone(),
        items,
        fetched_at: Utc::now(),
    })
}

#[async_trait]
impl MenuSource for SchoolCafeMenuSource {
    fn source_name(&self) -> String {
        "SchoolCafe menu API".to_string()
    }

    async fn fetch_menu(&self, entity: &Entity, date: &TargetDate) -> Result<MenuResult> {
        info!(entity = %entity.display_name, date = %date, "Getting lunch menu");

        let url = self.menu_url(entity, date);
        let response: MenuResponse = self.fetcher.get_json(&self.source_name(), url).await?;
        let menu = menu_from_response(entity, response)?;

        info!(entity = %entity.display_name, items = menu.items.len(), "Lunch menu loaded");
        Ok(menu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::decode_json;
    use crate::types::FetchConfig;
    use chrono::NaiveDate;

    const FIXTURE: &str = r#"{
        "ENTREES": [
            {"MenuItemDescription": "Cheese Pizza", "Calories": 310},
            {"MenuItemDescription": "  Garden Salad  "},
            {"MenuItemDescription": ""},
            {"Calories": 80},
            {"MenuItemDescription": "Chicken Nuggets"}
        ],
        "SIDES": [{"MenuItemDescription": "Apple Slices"}]
    }"#;

    fn school() -> Entity {
        Entity::new("d9edb69f-dc06-41a4-8d8d-15c3e47d812f", "Butts Road Intermediate")
    }

    fn source() -> SchoolCafeMenuSource {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        SchoolCafeMenuSource::new(fetcher, DEFAULT_MENU_ENDPOINT, MenuQuery::default()).unwrap()
    }

    #[test]
    fn extracts_entrees_in_source_order() {
        let response: MenuResponse = decode_json("menu", FIXTURE).unwrap();
        let menu = menu_from_response(&school(), response).unwrap();
        assert_eq!(menu.entity_id, school().id);
        assert_eq!(menu.items, vec!["Cheese Pizza", "Garden Salad", "Chicken Nuggets"]);
    }

    #[test]
    fn empty_entrees_is_no_menu_data() {
        let response: MenuResponse = decode_json("menu", r#"{"ENTREES": []}"#).unwrap();
        let err = menu_from_response(&school(), response).unwrap_err();
        assert!(matches!(err, NotifierError::NoMenuData { ref entity } if entity == "Butts Road Intermediate"));
    }

    #[test]
    fn missing_entrees_key_is_no_menu_data() {
        let response: MenuResponse = decode_json("menu", r#"{"LUNCH": [{"MenuItemDescription": "Tacos"}]}"#).unwrap();
        assert!(matches!(
            menu_from_response(&school(), response),
            Err(NotifierError::NoMenuData { .. })
        ));
    }

    #[test]
    fn non_object_body_is_malformed() {
        let err = decode_json::<MenuResponse>("menu", "<html>Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, NotifierError::MalformedResponse { .. }));
    }

    #[test]
    fn menu_url_encodes_date_and_school() {
        let date = TargetDate::new(
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            chrono_tz::America::New_York,
        );
        let url = source().menu_url(&school(), &date);
        let query = url.query().unwrap();

        assert!(url.as_str().starts_with(DEFAULT_MENU_ENDPOINT));
        assert!(query.contains("SchoolId=d9edb69f-dc06-41a4-8d8d-15c3e47d812f"));
        assert!(query.contains("ServingDate=10%2F20%2F2026"));
        assert!(query.contains("MealType=Lunch"));
        assert!(query.contains("Grade=02"));
        assert!(query.contains("PersonId=null"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("ServingDate".to_string(), "10/20/2026".to_string())));
        assert!(pairs.contains(&("ServingLine".to_string(), "Main Line".to_string())));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let result = SchoolCafeMenuSource::new(fetcher, "not a url", MenuQuery::default());
        assert!(matches!(result, Err(NotifierError::Config(_))));
    }
}
