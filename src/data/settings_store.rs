//! Per-user chart settings kept by the backend (one row per symbol).

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::config::persistence::{CHART_SETTINGS_PATH, SETTINGS_TIMEOUT_MS};
use crate::domain::Interval;

fn default_interval() -> String {
    Interval::default().as_str().to_string()
}

fn default_retracements() -> String {
    "[]".to_string()
}

/// Saved state of one chart card. `retracements` is itself JSON text (a list of
/// retracement params), stored verbatim by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSettings {
    pub symbol: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default)]
    pub volume_hidden: bool,
    #[serde(default = "default_retracements")]
    pub retracements: String,
}

impl ChartSettings {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            interval: default_interval(),
            volume_hidden: false,
            retracements: default_retracements(),
        }
    }

    /// Unknown interval text falls back to the default rather than dropping the chart.
    pub fn parsed_interval(&self) -> Interval {
        self.interval.parse().unwrap_or_else(|_| {
            log::warn!(
                "{}: unknown saved interval '{}', using {}",
                self.symbol,
                self.interval,
                Interval::default()
            );
            Interval::default()
        })
    }
}

/// Body of `GET /api/user/chart-settings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChartSettings {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub charts: Vec<ChartSettings>,
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ChartSettings>>;

    /// Insert or replace the row for `settings.symbol`.
    async fn save(&self, settings: &ChartSettings) -> Result<()>;

    async fn delete(&self, symbol: &str) -> Result<()>;

    fn signature(&self) -> &'static str;
}

pub struct HttpSettingsStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSettingsStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(SETTINGS_TIMEOUT_MS))
            .build()
            .context("building settings HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, CHART_SETTINGS_PATH)
    }

    pub fn item_url(&self, symbol: &str) -> String {
        format!("{}/{}", self.collection_url(), symbol.trim().to_uppercase())
    }
}

#[async_trait]
impl SettingsStore for HttpSettingsStore {
    async fn load_all(&self) -> Result<Vec<ChartSettings>> {
        let url = self.collection_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("GET {} failed with {}", url, response.status()));
        }
        let body: UserChartSettings = response
            .json()
            .await
            .with_context(|| format!("decoding {}", url))?;

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_settings_io {
            log::info!(
                "Loaded {} chart settings for {:?}",
                body.charts.len(),
                body.user_name
            );
        }
        Ok(body.charts)
    }

    async fn save(&self, settings: &ChartSettings) -> Result<()> {
        let url = self.collection_url();
        let response = self
            .client
            .post(&url)
            .json(settings)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "POST {} for {} failed with {}",
                url,
                settings.symbol,
                response.status()
            ));
        }
        Ok(())
    }

    async fn delete(&self, symbol: &str) -> Result<()> {
        let url = self.item_url(symbol);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("DELETE {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("DELETE {} failed with {}", url, response.status()));
        }
        Ok(())
    }

    fn signature(&self) -> &'static str {
        "HTTP backend"
    }
}

/// In-process store for `--offline` runs and tests. Same upsert/delete rules as the backend.
#[derive(Default)]
pub struct MemorySettingsStore {
    rows: Mutex<Vec<ChartSettings>>,
}

impl MemorySettingsStore {
    pub fn with_rows(rows: Vec<ChartSettings>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn snapshot(&self) -> Vec<ChartSettings> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_all(&self) -> Result<Vec<ChartSettings>> {
        Ok(self.snapshot())
    }

    async fn save(&self, settings: &ChartSettings) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        let symbol = settings.symbol.to_uppercase();
        match rows.iter_mut().find(|row| row.symbol == symbol) {
            Some(row) => *row = ChartSettings { symbol, ..settings.clone() },
            None => rows.push(ChartSettings { symbol, ..settings.clone() }),
        }
        Ok(())
    }

    async fn delete(&self, symbol: &str) -> Result<()> {
        let symbol = symbol.trim().to_uppercase();
        self.rows
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?
            .retain(|row| row.symbol != symbol);
        Ok(())
    }

    fn signature(&self) -> &'static str {
        "In-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn backend_payload_decodes_with_defaults() {
        let json = r#"{
            "userName": "demo",
            "charts": [
                { "symbol": "BTCUSDT", "interval": "4h", "volumeHidden": true, "retracements": "[]" },
                { "symbol": "ETHUSDT" }
            ]
        }"#;
        let body: UserChartSettings = serde_json::from_str(json).unwrap();
        assert_eq!(body.user_name.as_deref(), Some("demo"));
        assert_eq!(body.charts[0].parsed_interval(), Interval::H4);
        assert!(body.charts[0].volume_hidden);
        assert_eq!(body.charts[1], ChartSettings::new("ethusdt"));
    }

    #[test]
    fn settings_serialize_camel_case() {
        let json = serde_json::to_string(&ChartSettings::new("solusdt")).unwrap();
        assert_eq!(
            json,
            r#"{"symbol":"SOLUSDT","interval":"1h","volumeHidden":false,"retracements":"[]"}"#
        );
    }

    #[test]
    fn unknown_interval_falls_back() {
        let mut settings = ChartSettings::new("BTCUSDT");
        settings.interval = "3m".to_string();
        assert_eq!(settings.parsed_interval(), Interval::H1);
    }

    #[test]
    fn http_urls_follow_backend_routes() {
        let store = HttpSettingsStore::new("http://localhost:8080/").unwrap();
        assert_eq!(store.collection_url(), "http://localhost:8080/api/user/chart-settings");
        assert_eq!(
            store.item_url("btcusdt"),
            "http://localhost:8080/api/user/chart-settings/BTCUSDT"
        );
    }

    #[test]
    fn memory_store_upserts_by_symbol() {
        let store = MemorySettingsStore::default();
        block_on(store.save(&ChartSettings::new("BTCUSDT"))).unwrap();
        block_on(store.save(&ChartSettings::new("ETHUSDT"))).unwrap();

        let mut updated = ChartSettings::new("BTCUSDT");
        updated.interval = "1d".to_string();
        block_on(store.save(&updated)).unwrap();

        let rows = block_on(store.load_all()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].interval, "1d");

        block_on(store.delete("btcusdt")).unwrap();
        let rows = block_on(store.load_all()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "ETHUSDT");
    }
}
