//! Retracement overlays: horizontal price levels derived from a start/end swing.

use serde::{Deserialize, Serialize};

use crate::utils::format::fmt_num;

/// (label, ratio of the end - start span measured back from the end price)
pub const RETRACEMENT_RATIOS: [(&str, f64); 8] = [
    ("10%", 0.10),
    ("25%", 0.25),
    ("33%", 0.33),
    ("38.2%", 0.382),
    ("50%", 0.50),
    ("61.8%", 0.618),
    ("66%", 0.66),
    ("75%", 0.75),
];

#[derive(Debug, Clone, PartialEq)]
pub struct RetracementLevel {
    pub label: &'static str,
    pub ratio: f64,
    pub price: f64,
}

/// Levels at each ratio of the swing, expressed as `end - (end - start) * ratio`.
pub fn calculate_retracements(start_price: f64, end_price: f64) -> Vec<RetracementLevel> {
    let diff = end_price - start_price;
    RETRACEMENT_RATIOS
        .iter()
        .map(|&(label, ratio)| RetracementLevel {
            label,
            ratio,
            price: end_price - diff * ratio,
        })
        .collect()
}

/// What the user entered, plus the visibility flag. This is the persisted shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetracementParams {
    pub id: String,
    pub start_price: f64,
    pub end_price: f64,
    pub start_date_ms: i64,
    pub end_date_ms: i64,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTone {
    Start,
    End,
    Uptrend,
    Downtrend,
}

/// One labelled horizontal line handed to the chart widget.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMarker {
    pub price: f64,
    pub label: String,
    pub tone: MarkerTone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetracementOverlay {
    pub params: RetracementParams,
    pub levels: Vec<RetracementLevel>,
}

impl RetracementOverlay {
    pub fn new(params: RetracementParams) -> Self {
        let levels = calculate_retracements(params.start_price, params.end_price);
        Self { params, levels }
    }

    pub fn id(&self) -> &str {
        &self.params.id
    }

    pub fn is_hidden(&self) -> bool {
        self.params.hidden
    }

    pub fn is_uptrend(&self) -> bool {
        self.params.end_price > self.params.start_price
    }

    /// Start and end lines first, then one line per level.
    pub fn markers(&self) -> Vec<PriceMarker> {
        let level_tone = if self.is_uptrend() {
            MarkerTone::Uptrend
        } else {
            MarkerTone::Downtrend
        };

        let mut markers = Vec::with_capacity(self.levels.len() + 2);
        markers.push(PriceMarker {
            price: self.params.start_price,
            label: format!("Start ({})", fmt_num(Some(self.params.start_price))),
            tone: MarkerTone::Start,
        });
        markers.push(PriceMarker {
            price: self.params.end_price,
            label: format!("End ({})", fmt_num(Some(self.params.end_price))),
            tone: MarkerTone::End,
        });
        markers.extend(self.levels.iter().map(|level| PriceMarker {
            price: level.price,
            label: format!("{} ({:.2})", level.label, level.price),
            tone: level_tone,
        }));
        markers
    }
}

/// Marker set for every visible overlay, in insertion order.
pub fn combined_markers(overlays: &[RetracementOverlay]) -> Vec<PriceMarker> {
    overlays
        .iter()
        .filter(|overlay| !overlay.is_hidden())
        .flat_map(|overlay| overlay.markers())
        .collect()
}

/// Decodes the persisted JSON list. Malformed text yields no overlays.
pub fn decode_params_list(json: &str) -> Vec<RetracementParams> {
    match serde_json::from_str::<Vec<RetracementParams>>(json) {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Ignoring unreadable retracement list: {}", e);
            Vec::new()
        }
    }
}

pub fn encode_params_list(overlays: &[RetracementOverlay]) -> String {
    let params: Vec<&RetracementParams> = overlays.iter().map(|o| &o.params).collect();
    serde_json::to_string(&params).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(id: &str, start: f64, end: f64) -> RetracementParams {
        RetracementParams {
            id: id.to_string(),
            start_price: start,
            end_price: end,
            start_date_ms: 0,
            end_date_ms: 1,
            hidden: false,
        }
    }

    fn level(levels: &[RetracementLevel], label: &str) -> f64 {
        levels.iter().find(|l| l.label == label).unwrap().price
    }

    #[test]
    fn levels_measure_back_from_the_end_price() {
        let levels = calculate_retracements(100.0, 200.0);
        assert_eq!(levels.len(), 8);
        assert!((level(&levels, "50%") - 150.0).abs() < 1e-9);
        assert!((level(&levels, "61.8%") - 138.2).abs() < 1e-9);
        assert!((level(&levels, "10%") - 190.0).abs() < 1e-9);
        assert!((level(&levels, "75%") - 125.0).abs() < 1e-9);
    }

    #[test]
    fn downtrend_levels_sit_above_the_end() {
        let levels = calculate_retracements(200.0, 100.0);
        assert!((level(&levels, "50%") - 150.0).abs() < 1e-9);
        assert!(levels.iter().all(|l| l.price > 100.0 && l.price < 200.0));
    }

    #[test]
    fn markers_include_start_and_end() {
        let overlay = RetracementOverlay::new(params("a", 100.0, 200.0));
        let markers = overlay.markers();
        assert_eq!(markers.len(), 10);
        assert_eq!(markers[0].label, "Start (100.00)");
        assert_eq!(markers[0].tone, MarkerTone::Start);
        assert_eq!(markers[1].label, "End (200.00)");
        assert_eq!(markers[6].label, "50% (150.00)");
        assert!(markers[2..].iter().all(|m| m.tone == MarkerTone::Uptrend));
    }

    #[test]
    fn hidden_overlays_are_left_out_of_the_marker_set() {
        let visible = RetracementOverlay::new(params("a", 100.0, 200.0));
        let mut hidden = RetracementOverlay::new(params("b", 1.0, 2.0));
        hidden.params.hidden = true;

        let markers = combined_markers(&[visible, hidden]);
        assert_eq!(markers.len(), 10);
        assert!(markers.iter().all(|m| m.price >= 100.0));
    }

    #[test]
    fn params_list_round_trips_through_json() {
        let overlays = vec![RetracementOverlay::new(params("a", 100.0, 200.0))];
        let json = encode_params_list(&overlays);
        assert!(json.contains("\"startPrice\":100.0"));
        assert_eq!(decode_params_list(&json), vec![overlays[0].params.clone()]);
        assert!(decode_params_list("not json").is_empty());
    }
}
