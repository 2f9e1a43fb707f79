// External crates
use anyhow::Result;
use async_trait::async_trait;
use binance_sdk::config::ConfigurationRestApi;
use binance_sdk::spot::{
    SpotRestApi,
    rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
};
use binance_sdk::{errors, errors::ConnectorError as connection_error};

// Local crates
use crate::config::binance::BinanceApiConfig;
use crate::data::history_source::{HistoryError, KlineFetcher, KlineRequest};
use crate::domain::{CandlePoint, Interval};

impl From<Interval> for KlinesIntervalEnum {
    fn from(interval: Interval) -> Self {
        match interval {
            Interval::M1 => KlinesIntervalEnum::Interval1m,
            Interval::M5 => KlinesIntervalEnum::Interval5m,
            Interval::M15 => KlinesIntervalEnum::Interval15m,
            Interval::H1 => KlinesIntervalEnum::Interval1h,
            Interval::H4 => KlinesIntervalEnum::Interval4h,
            Interval::D1 => KlinesIntervalEnum::Interval1d,
            Interval::W1 => KlinesIntervalEnum::Interval1w,
        }
    }
}

/*
Extracts a float from a kline cell. Binance sends prices and volumes as strings, so only the
String variant that parses cleanly yields Some; any other variant or bad text yields None.
*/
fn convert_kline_item_inner_enum_string_to_float(kline: Option<KlinesItemInner>) -> Option<f64> {
    kline.and_then(|inner| {
        if let KlinesItemInner::String(s) = inner {
            s.parse::<f64>().ok()
        } else {
            None
        }
    })
}

/// Positional row layout: `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn convert_kline_row(row: Vec<KlinesItemInner>) -> Result<CandlePoint, HistoryError> {
    let mut items = row.into_iter();
    let timestamp_ms = match items.next() {
        Some(KlinesItemInner::Integer(a)) => a,
        Some(_) => return Err(HistoryError::InvalidResponse("open_time".to_string())),
        None => return Err(HistoryError::InvalidResponse("empty row".to_string())),
    };

    let mut price = |field: &str| {
        convert_kline_item_inner_enum_string_to_float(items.next())
            .ok_or_else(|| HistoryError::InvalidResponse(format!("{} at {}", field, timestamp_ms)))
    };
    let open = price("open")?;
    let high = price("high")?;
    let low = price("low")?;
    let close = price("close")?;
    let volume = convert_kline_item_inner_enum_string_to_float(items.next());

    Ok(CandlePoint::new(timestamp_ms, open, high, low, close, volume))
}

fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<CandlePoint>, HistoryError> {
    data.into_iter().map(convert_kline_row).collect()
}

fn status_of(code: impl Into<Option<u16>>) -> u16 {
    code.into().unwrap_or(500)
}

/// Maps SDK failures onto `HistoryError`, logging each one the way the rest of the app does.
fn map_connector_error(e: anyhow::Error, label: &str) -> HistoryError {
    let Some(conn_err) = e.downcast_ref::<errors::ConnectorError>() else {
        log::error!("An unexpected error occurred for {}: {:#}", label, e);
        return HistoryError::Network(e.to_string());
    };

    match conn_err {
        connection_error::ConnectorClientError(msg) => {
            log::error!("{} Client error: Check your request parameters. {}", label, msg);
            HistoryError::Upstream {
                status: 400,
                message: msg.to_string(),
            }
        }
        connection_error::TooManyRequestsError(msg) => {
            log::error!("{} Rate limit exceeded. Please wait and try again. {}", label, msg);
            HistoryError::RateLimited
        }
        connection_error::RateLimitBanError(msg) => {
            log::error!("{} IP address banned due to excessive rate limits. {}", label, msg);
            HistoryError::RateLimited
        }
        errors::ConnectorError::ServerError { msg, status_code } => {
            log::error!("{} Server error: {} (status code: {:?})", label, msg, status_code);
            HistoryError::Upstream {
                status: status_of(*status_code),
                message: msg.to_string(),
            }
        }
        errors::ConnectorError::NetworkError(msg) => {
            log::error!("{} Network error: Check your internet connection. {}", label, msg);
            HistoryError::Network(msg.to_string())
        }
        errors::ConnectorError::NotFoundError(msg) => {
            log::error!("{} Resource not found. {}", label, msg);
            HistoryError::Upstream {
                status: 404,
                message: msg.to_string(),
            }
        }
        connection_error::BadRequestError(msg) => {
            log::error!("{} Bad request: Verify your input parameters. {}", label, msg);
            HistoryError::Upstream {
                status: 400,
                message: msg.to_string(),
            }
        }
        other => {
            log::error!("{} Unexpected ConnectionError variant: {:?}", label, other);
            HistoryError::Network(other.to_string())
        }
    }
}

/// Live klines from Binance spot. One client per app, shared by every history source.
pub struct BinanceKlineFetcher {
    rest_client: RestApi,
}

impl BinanceKlineFetcher {
    pub fn new() -> Result<Self> {
        let config = BinanceApiConfig::default();
        let rest_conf = ConfigurationRestApi::builder()
            .timeout(config.timeout_ms)
            .retries(config.retries)
            .backoff(config.backoff_ms)
            .build()?;
        // Create the Spot REST API client
        let rest_client = SpotRestApi::production(rest_conf);
        Ok(Self { rest_client })
    }
}

#[async_trait]
impl KlineFetcher for BinanceKlineFetcher {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<CandlePoint>, HistoryError> {
        let label = format!("{}_{}", request.symbol, request.interval);

        let params = KlinesParams::builder(request.symbol.clone(), request.interval.into())
            .limit(request.limit as i32)
            .end_time(request.end_time_ms)
            .build()
            .map_err(|e| HistoryError::InvalidResponse(format!("{}: {}", label, e)))?;

        let response = self
            .rest_client
            .klines(params)
            .await
            .map_err(|e| map_connector_error(e, &label))?;

        let data = response.data().await.map_err(|e| {
            log::error!("{} could not read klines body: {:#}", label, e);
            HistoryError::InvalidResponse(e.to_string())
        })?;

        convert_klines(data).inspect_err(|e| log::error!("{} convert_klines failed: {}", label, e))
    }

    fn signature(&self) -> &'static str {
        "Binance API"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> KlinesItemInner {
        KlinesItemInner::String(s.to_string())
    }

    #[test]
    fn rows_map_positionally() {
        let row = vec![
            KlinesItemInner::Integer(1_700_000_000_000),
            text("100.5"),
            text("110.0"),
            text("99.0"),
            text("105.25"),
            text("12.5"),
            KlinesItemInner::Integer(1_700_000_059_999),
        ];
        let point = convert_kline_row(row).unwrap();
        assert_eq!(
            point,
            CandlePoint::new(1_700_000_000_000, 100.5, 110.0, 99.0, 105.25, Some(12.5))
        );
    }

    #[test]
    fn bad_rows_are_invalid_responses() {
        let row = vec![text("oops"), text("1")];
        assert!(matches!(convert_kline_row(row), Err(HistoryError::InvalidResponse(_))));

        let short = vec![KlinesItemInner::Integer(1), text("1"), text("2")];
        assert!(matches!(convert_kline_row(short), Err(HistoryError::InvalidResponse(_))));
    }

    #[test]
    fn missing_volume_is_allowed() {
        let row = vec![
            KlinesItemInner::Integer(5),
            text("1"),
            text("2"),
            text("0.5"),
            text("1.5"),
        ];
        assert_eq!(convert_kline_row(row).unwrap().volume, None);
    }

    #[test]
    fn intervals_map_to_sdk_enum() {
        assert!(matches!(
            KlinesIntervalEnum::from(Interval::M15),
            KlinesIntervalEnum::Interval15m
        ));
        assert!(matches!(
            KlinesIntervalEnum::from(Interval::W1),
            KlinesIntervalEnum::Interval1w
        ));
    }
}
