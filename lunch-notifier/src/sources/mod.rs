pub mod menu;
pub mod weather;

pub use menu::{MenuQuery, SchoolCafeMenuSource};
pub use weather::WttrWeatherSource;
