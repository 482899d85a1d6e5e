//! Plain-text output for the terminal.

use weather_core::{ForecastEntry, WeatherSnapshot};

pub fn weather(city: &str, w: &WeatherSnapshot) -> String {
    let place = if w.country_code.is_empty() {
        city.to_string()
    } else {
        format!("{city}, {}", w.country_code)
    };

    format!(
        "{place}\n  {:.0}°C, feels like {:.0}°C\n  {}\n  Humidity {}%",
        w.temperature, w.feels_like, w.description, w.humidity
    )
}

/// One line per day: weekday, date, low/high.
pub fn forecast(entries: &[ForecastEntry]) -> String {
    entries
        .iter()
        .filter_map(|e| {
            let day = e.time()?.format("%a %d %b");
            Some(format!("{day}  {:>4.0}° / {:>3.0}°", e.temp_min, e.temp_max))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
