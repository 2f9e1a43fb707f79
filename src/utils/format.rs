//! Display formatting for prices, volumes and candle timestamps.
//!
//! Everything here is pure and UTC based so labels are identical on every machine.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::domain::Interval;
use crate::utils::time_utils::epoch_ms_to_datetime;

/// Formats a price with en-US thousands grouping and exactly two decimals.
/// Missing or non-finite values render as `-`.
pub fn fmt_num(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return "-".to_string();
    };

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.');
    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Compact volume label (K / M / B).
pub fn fmt_volume(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.2} B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.2} M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.2} K", value / 1_000.0)
    } else {
        format!("{:.2}", value)
    }
}

pub fn pad2(n: u32) -> String {
    format!("{:02}", n)
}

/// `YYYY-MM-DDTHH:MM:00Z`
pub fn to_iso_utc(epoch_ms: i64) -> String {
    match epoch_ms_to_datetime(epoch_ms) {
        Some(dt) => format!(
            "{}-{}-{}T{}:{}:00Z",
            dt.year(),
            pad2(dt.month()),
            pad2(dt.day()),
            pad2(dt.hour()),
            pad2(dt.minute())
        ),
        None => "-".to_string(),
    }
}

/// `YYYY/MM/DD HH:MM`
pub fn fmt_ymd_hm_utc(epoch_ms: i64) -> String {
    match epoch_ms_to_datetime(epoch_ms) {
        Some(dt) => format!(
            "{}/{}/{} {}:{}",
            dt.year(),
            pad2(dt.month()),
            pad2(dt.day()),
            pad2(dt.hour()),
            pad2(dt.minute())
        ),
        None => "-".to_string(),
    }
}

/// `YYYY/MM/DD`
pub fn fmt_ymd_utc(epoch_ms: i64) -> String {
    match epoch_ms_to_datetime(epoch_ms) {
        Some(dt) => format!("{}/{}/{}", dt.year(), pad2(dt.month()), pad2(dt.day())),
        None => "-".to_string(),
    }
}

/// Daily and weekly candles only need the date.
pub fn format_for_interval(epoch_ms: i64, interval: Interval) -> String {
    if interval.is_daily_or_longer() {
        fmt_ymd_utc(epoch_ms)
    } else {
        fmt_ymd_hm_utc(epoch_ms)
    }
}

/// Parses user-entered UTC dates into epoch milliseconds.
pub fn parse_utc_datetime(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().timestamp_millis());
        }
    }
    None
}
