use serde::{Deserialize, Serialize};

// Define the CandleType enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleType {
    Bullish,
    Bearish,
}

/// One OHLC(V) bucket as returned by the exchange. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandlePoint {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl CandlePoint {
    // A constructor for convenience
    pub fn new(
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Self {
        CandlePoint {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    // A method to determine the type of candle
    pub fn candle_type(&self) -> CandleType {
        if self.close >= self.open {
            CandleType::Bullish
        } else {
            CandleType::Bearish
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.candle_type() == CandleType::Bullish
    }

    // Returns the low and high of the candle body as a tuple
    pub fn body_range(&self) -> (f64, f64) {
        match self.candle_type() {
            CandleType::Bullish => (self.open, self.close),
            CandleType::Bearish => (self.close, self.open),
        }
    }
}

/// A volume column coloured by the direction of its candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBar {
    pub timestamp_ms: i64,
    pub volume: f64,
    pub bullish: bool,
}

/// Rebuilds the volume column for every buffered candle. Missing volume counts as zero.
pub fn volume_bars(candles: &[CandlePoint]) -> Vec<VolumeBar> {
    candles
        .iter()
        .map(|candle| VolumeBar {
            timestamp_ms: candle.timestamp_ms,
            volume: candle.volume.unwrap_or(0.0),
            bullish: candle.is_bullish(),
        })
        .collect()
}

/// Prepends an older page in front of `buffer`.
///
/// Points that are not strictly older than the current first point are dropped so the
/// buffer stays strictly ascending. Returns how many points were added.
pub fn prepend_older(buffer: &mut Vec<CandlePoint>, mut batch: Vec<CandlePoint>) -> usize {
    if let Some(first) = buffer.first() {
        let boundary = first.timestamp_ms;
        batch.retain(|p| p.timestamp_ms < boundary);
    }
    batch.sort_by_key(|p| p.timestamp_ms);
    batch.dedup_by_key(|p| p.timestamp_ms);

    let added = batch.len();
    buffer.splice(0..0, batch);
    added
}
