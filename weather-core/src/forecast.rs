//! Reduction of the provider's 3-hourly forecast series to one reading per day.

use chrono::{NaiveDate, Timelike};

use crate::model::ForecastEntry;

/// Hour (UTC) of the reading that represents a whole day.
pub const DAILY_SAMPLE_HOUR: u32 = 12;

/// Keep only the entries taken exactly at the daily sample marker, at most one
/// per calendar day, in chronological order.
///
/// Entries with an unrepresentable timestamp are dropped.
pub fn daily_samples(entries: &[ForecastEntry]) -> Vec<ForecastEntry> {
    let mut samples: Vec<ForecastEntry> = entries
        .iter()
        .filter(|entry| is_daily_sample(entry))
        .cloned()
        .collect();
    samples.sort_by_key(|entry| entry.timestamp);

    let mut last_day: Option<NaiveDate> = None;
    samples.retain(|entry| {
        let day = entry.time().map(|t| t.date_naive());
        if day == last_day {
            false
        } else {
            last_day = day;
            true
        }
    });

    samples
}

fn is_daily_sample(entry: &ForecastEntry) -> bool {
    entry.time().is_some_and(|t| {
        t.hour() == DAILY_SAMPLE_HOUR && t.minute() == 0 && t.second() == 0
    })
}
