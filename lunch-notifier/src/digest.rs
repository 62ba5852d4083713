use crate::types::{MenuSection, TargetDate, WeatherResult};

/// Heading for the single section shown when every school serves the same menu.
pub const SHARED_MENU_HEADING: &str = "Lunch";
pub const WEATHER_HEADING: &str = "Weather";

pub fn header_line(date: &TargetDate) -> String {
    format!("Lunch menu for {}:", date.us_format())
}

pub fn section_heading(section: &MenuSection) -> String {
    if section.shared {
        SHARED_MENU_HEADING.to_string()
    } else {
        section.entity_names.join(" & ")
    }
}

/// Render the artifact body: header, one block per menu section, then the
/// weather block when it has readings. Blocks are separated by a blank line.
pub fn render(date: &TargetDate, sections: &[MenuSection], weather: Option<&WeatherResult>) -> String {
    let mut blocks = vec![header_line(date)];

    for section in sections {
        let mut block = format!("*{}*:", section_heading(section));
        for item in &section.items {
            block.push('\n');
            block.push_str(item);
        }
        blocks.push(block);
    }

    if let Some(weather) = weather.filter(|w| w.has_data()) {
        let mut block = format!("*{WEATHER_HEADING}*:");
        for reading in &weather.readings {
            block.push_str(&format!(
                "\n{} - {}°F - {}",
                reading.label, reading.temperature_f, reading.description
            ));
        }
        blocks.push(block);
    }

    let mut text = blocks.join("\n\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeatherReading;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date() -> TargetDate {
        TargetDate::new(
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            chrono_tz::America::New_York,
        )
    }

    #[test]
    fn renders_labeled_sections_and_weather() {
        let sections = vec![
            MenuSection {
                entity_names: vec!["Butts Road Intermediate".into()],
                items: vec!["Pizza".into(), "Salad".into()],
                shared: false,
            },
            MenuSection {
                entity_names: vec!["Butts Road Primary".into()],
                items: vec!["Tacos".into()],
                shared: false,
            },
        ];
        let weather = WeatherResult {
            date: date().date,
            readings: vec![WeatherReading {
                label: "6 AM".into(),
                temperature_f: 55,
                description: "Cloudy".into(),
            }],
        };

        let text = render(&date(), &sections, Some(&weather));
        assert_eq!(
            text,
            "Lunch menu for 10/20/2026:\n\n\
             *Butts Road Intermediate*:\nPizza\nSalad\n\n\
             *Butts Road Primary*:\nTacos\n\n\
             *Weather*:\n6 AM - 55°F - Cloudy\n"
        );
    }

    #[test]
    fn empty_weather_is_omitted() {
        let sections = vec![MenuSection {
            entity_names: vec!["A".into(), "B".into()],
            items: vec!["Soup".into()],
            shared: true,
        }];
        let weather = WeatherResult::no_data(date().date);
        let text = render(&date(), &sections, Some(&weather));
        assert_eq!(text, "Lunch menu for 10/20/2026:\n\n*Lunch*:\nSoup\n");
        assert!(!text.contains("Weather"));
    }

    #[test]
    fn group_heading_joins_names() {
        let section = MenuSection {
            entity_names: vec!["A".into(), "B".into()],
            items: vec![],
            shared: false,
        };
        assert_eq!(section_heading(&section), "A & B");
    }
}
