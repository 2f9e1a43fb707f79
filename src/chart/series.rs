use crate::data::HistorySource;
use crate::domain::CandlePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Candlestick,
    VolumeBar,
}

/// Where a series' points come from.
///
/// A sourced series lends its `HistorySource` to the fetch task while a page is in
/// flight, so `source` is `None` exactly while that fetch is outstanding.
#[derive(Debug)]
pub enum SeriesData {
    Sourced {
        source: Option<HistorySource>,
        points: Vec<CandlePoint>,
    },
    Static(Vec<CandlePoint>),
}

#[derive(Debug)]
pub struct SeriesDef {
    pub id: String,
    pub name: String,
    pub kind: SeriesKind,
    pub data: SeriesData,
}

impl SeriesDef {
    pub fn sourced(id: &str, name: &str, source: HistorySource) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: SeriesKind::Candlestick,
            data: SeriesData::Sourced {
                source: Some(source),
                points: Vec::new(),
            },
        }
    }

    pub fn static_candles(id: &str, name: &str, points: Vec<CandlePoint>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: SeriesKind::Candlestick,
            data: SeriesData::Static(points),
        }
    }

    /// Volume columns mirror the candles of the primary series; they start empty.
    pub fn volume(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: SeriesKind::VolumeBar,
            data: SeriesData::Static(Vec::new()),
        }
    }

    pub fn points(&self) -> &[CandlePoint] {
        match &self.data {
            SeriesData::Sourced { points, .. } => points,
            SeriesData::Static(points) => points,
        }
    }

    pub fn points_mut(&mut self) -> &mut Vec<CandlePoint> {
        match &mut self.data {
            SeriesData::Sourced { points, .. } => points,
            SeriesData::Static(points) => points,
        }
    }

    pub fn is_sourced(&self) -> bool {
        matches!(self.data, SeriesData::Sourced { .. })
    }

    pub fn source(&self) -> Option<&HistorySource> {
        match &self.data {
            SeriesData::Sourced { source, .. } => source.as_ref(),
            SeriesData::Static(_) => None,
        }
    }

    pub fn source_mut(&mut self) -> Option<&mut HistorySource> {
        match &mut self.data {
            SeriesData::Sourced { source, .. } => source.as_mut(),
            SeriesData::Static(_) => None,
        }
    }

    /// Lends the source out for a fetch. `None` for static series or while already lent.
    pub fn take_source(&mut self) -> Option<HistorySource> {
        match &mut self.data {
            SeriesData::Sourced { source, .. } => source.take(),
            SeriesData::Static(_) => None,
        }
    }

    pub fn restore_source(&mut self, returned: HistorySource) {
        if let SeriesData::Sourced { source, .. } = &mut self.data {
            *source = Some(returned);
        }
    }

    pub fn clear(&mut self) {
        self.points_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_fetchers::ScriptedFetcher;
    use crate::domain::Interval;
    use std::sync::Arc;

    #[test]
    fn source_is_lent_and_returned() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 5));
        let source = HistorySource::new("BTCUSDT", Interval::M1, fetcher);
        let mut series = SeriesDef::sourced("price", "BTCUSDT", source);

        let lent = series.take_source().unwrap();
        assert!(series.source().is_none());
        assert!(series.is_sourced());
        assert!(series.take_source().is_none());

        series.restore_source(lent);
        assert_eq!(series.source().map(|s| s.symbol()), Some("BTCUSDT"));
    }

    #[test]
    fn static_series_never_has_a_source() {
        let mut series = SeriesDef::volume("vol", "Volume");
        assert!(!series.is_sourced());
        assert!(series.take_source().is_none());
        assert_eq!(series.kind, SeriesKind::VolumeBar);
    }
}
