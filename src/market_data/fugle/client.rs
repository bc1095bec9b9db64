// =============================================================================
// Fugle Market Data REST client
// =============================================================================
//
// SECURITY: The API key is sent only as the X-API-KEY header and is never
// logged or serialized.  Every request first takes a slot from the shared
// per-minute `RequestBudget`.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument};

use super::parse;
use crate::market_data::rate_limit::RequestBudget;
use crate::market_data::{Candle, MarketDataSource, PriceVolume, Quote, SnapshotRow, TradePrint};

pub const DEFAULT_BASE_URL: &str = "https://api.fugle.tw/marketdata/v1.0/stock";

/// Taipei is UTC+8 with no daylight saving.
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

/// REST client for the Fugle stock market-data API.
#[derive(Clone)]
pub struct FugleClient {
    base_url: String,
    client: reqwest::Client,
    budget: Arc<RequestBudget>,
}

impl FugleClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `FugleClient`.
    ///
    /// # Arguments
    /// * `api_key`: Fugle API key (sent as a header, never in query params).
    /// * `base_url`: endpoint root, normally [`DEFAULT_BASE_URL`].
    /// * `timeout`: per-request HTTP timeout.
    /// * `budget`: request budget shared with every clone of this client.
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
        budget: Arc<RequestBudget>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("Fugle API key is empty — set FUGLE_API_KEY or api_key in the config file");
        }

        let mut default_headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key.trim()).context("API key is not a valid header value")?;
        key.set_sensitive(true);
        default_headers.insert("X-API-KEY", key);

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "FugleClient initialised");

        Ok(Self {
            base_url,
            client,
            budget,
        })
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// GET `{base_url}{path}` and decode the JSON body.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.budget.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = resp.status();
        match status {
            StatusCode::NOT_FOUND => bail!("GET {path}: symbol not found (404)"),
            StatusCode::TOO_MANY_REQUESTS => bail!("GET {path}: rate limited by server (429)"),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                bail!("GET {path}: API key rejected ({status})")
            }
            _ => {}
        }

        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read {path} response body"))?;

        if !status.is_success() {
            bail!("Fugle GET {path} returned {status}: {text}");
        }

        serde_json::from_str(&text).with_context(|| format!("failed to parse {path} response"))
    }
}

impl MarketDataSource for FugleClient {
    /// GET /intraday/quote/{symbol}
    #[instrument(skip(self), name = "fugle::quote")]
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let body = self.get_json(&format!("/intraday/quote/{symbol}"), &[]).await?;
        let quote = parse::parse_quote(&body)?;
        debug!(symbol, volume = quote.trade_volume, "quote fetched");
        Ok(quote)
    }

    /// GET /historical/candles/{symbol}?from&to&timeframe=D
    #[instrument(skip(self), name = "fugle::daily_candles")]
    async fn daily_candles(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Candle>> {
        let tz = FixedOffset::east_opt(TAIPEI_OFFSET_SECS).context("invalid Taipei offset")?;
        let today = Utc::now().with_timezone(&tz).date_naive();
        let from = today - chrono::Duration::days(i64::from(lookback_days));

        let query = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", today.format("%Y-%m-%d").to_string()),
            ("timeframe", "D".to_string()),
        ];
        let body = self
            .get_json(&format!("/historical/candles/{symbol}"), &query)
            .await?;
        let candles = parse::parse_candles(&body)?;
        debug!(symbol, count = candles.len(), "daily candles fetched");
        Ok(candles)
    }

    /// GET /intraday/candles/{symbol}?timeframe=N
    #[instrument(skip(self), name = "fugle::intraday_candles")]
    async fn intraday_candles(&self, symbol: &str, timeframe_minutes: u32) -> Result<Vec<Candle>> {
        let query = [("timeframe", timeframe_minutes.max(1).to_string())];
        let body = self
            .get_json(&format!("/intraday/candles/{symbol}"), &query)
            .await?;
        let candles = parse::parse_candles(&body)?;
        debug!(symbol, count = candles.len(), "intraday candles fetched");
        Ok(candles)
    }

    /// GET /intraday/trades/{symbol}?limit=N
    #[instrument(skip(self), name = "fugle::trades")]
    async fn trades(&self, symbol: &str, limit: u32) -> Result<Vec<TradePrint>> {
        let query = [("limit", limit.max(1).to_string())];
        let body = self
            .get_json(&format!("/intraday/trades/{symbol}"), &query)
            .await?;
        let trades = parse::parse_trades(&body)?;
        debug!(symbol, count = trades.len(), "trades fetched");
        Ok(trades)
    }

    /// GET /intraday/volumes/{symbol}
    #[instrument(skip(self), name = "fugle::volumes")]
    async fn volumes(&self, symbol: &str) -> Result<Vec<PriceVolume>> {
        let body = self.get_json(&format!("/intraday/volumes/{symbol}"), &[]).await?;
        let rows = parse::parse_volumes(&body)?;
        debug!(symbol, levels = rows.len(), "price-volume table fetched");
        Ok(rows)
    }

    /// GET /intraday/ticker/{symbol}
    #[instrument(skip(self), name = "fugle::ticker_name")]
    async fn ticker_name(&self, symbol: &str) -> Result<String> {
        let body = self.get_json(&format!("/intraday/ticker/{symbol}"), &[]).await?;
        parse::parse_ticker_name(&body)
    }

    /// GET /snapshot/quotes/{market}?type=COMMONSTOCK
    #[instrument(skip(self), name = "fugle::market_snapshot")]
    async fn market_snapshot(&self, market: &str) -> Result<Vec<SnapshotRow>> {
        let query = [("type", "COMMONSTOCK".to_string())];
        let body = self
            .get_json(&format!("/snapshot/quotes/{market}"), &query)
            .await?;
        let rows = parse::parse_snapshot(&body)?;
        debug!(market, count = rows.len(), "market snapshot fetched");
        Ok(rows)
    }

    /// GET /intraday/tickers?type=EQUITY&exchange={exchange}&isNormal=true
    #[instrument(skip(self), name = "fugle::tickers")]
    async fn tickers(&self, exchange: &str) -> Result<Vec<SnapshotRow>> {
        let query = [
            ("type", "EQUITY".to_string()),
            ("exchange", exchange.to_string()),
            ("isNormal", "true".to_string()),
        ];
        let body = self.get_json("/intraday/tickers", &query).await?;
        let rows = parse::parse_tickers(&body)?;
        debug!(exchange, count = rows.len(), "ticker list fetched");
        Ok(rows)
    }

    fn request_budget(&self) -> Option<&RequestBudget> {
        Some(&self.budget)
    }
}

impl std::fmt::Debug for FugleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FugleClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("budget", &self.budget)
            .finish()
    }
}
