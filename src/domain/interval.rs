//! Candle bucket sizes supported by the chart cards.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::utils::TimeUtils;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
pub enum Interval {
    #[serde(rename = "1m")]
    #[strum(serialize = "1m")]
    M1,
    #[serde(rename = "5m")]
    #[strum(serialize = "5m")]
    M5,
    #[serde(rename = "15m")]
    #[strum(serialize = "15m")]
    M15,
    #[default]
    #[serde(rename = "1h")]
    #[strum(serialize = "1h")]
    H1,
    #[serde(rename = "4h")]
    #[strum(serialize = "4h")]
    H4,
    #[serde(rename = "1d")]
    #[strum(serialize = "1d")]
    D1,
    #[serde(rename = "1w")]
    #[strum(serialize = "1w")]
    W1,
}

impl Interval {
    /// Binance-style shorthand (e.g. `15m`, `4h`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }

    pub fn to_ms(&self) -> i64 {
        match self {
            Interval::M1 => TimeUtils::MS_IN_MIN,
            Interval::M5 => TimeUtils::MS_IN_5_MIN,
            Interval::M15 => TimeUtils::MS_IN_15_MIN,
            Interval::H1 => TimeUtils::MS_IN_H,
            Interval::H4 => TimeUtils::MS_IN_4_H,
            Interval::D1 => TimeUtils::MS_IN_D,
            Interval::W1 => TimeUtils::MS_IN_W,
        }
    }

    pub fn is_daily_or_longer(&self) -> bool {
        matches!(self, Interval::D1 | Interval::W1)
    }

    /// Picks the bucket size that renders roughly `target_points` candles over `span_ms`.
    /// Buckets never go below one minute; the 6h step rounds down to 4h.
    pub fn suggest_for_span(span_ms: i64, target_points: usize) -> Interval {
        let desired = target_points.max(1) as i64;
        let bucket_ms = (span_ms.max(0) / desired).max(TimeUtils::MS_IN_MIN);

        if bucket_ms <= TimeUtils::MS_IN_MIN {
            Interval::M1
        } else if bucket_ms <= TimeUtils::MS_IN_5_MIN {
            Interval::M5
        } else if bucket_ms <= TimeUtils::MS_IN_15_MIN {
            Interval::M15
        } else if bucket_ms <= TimeUtils::MS_IN_H {
            Interval::H1
        } else if bucket_ms <= TimeUtils::MS_IN_6_H {
            Interval::H4
        } else if bucket_ms <= TimeUtils::MS_IN_D {
            Interval::D1
        } else {
            Interval::W1
        }
    }
}
