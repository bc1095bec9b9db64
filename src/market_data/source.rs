// =============================================================================
// Market Data Source — the accessor contract the pipeline depends on
// =============================================================================
//
// Any failure (unknown symbol, HTTP error, malformed payload) surfaces as an
// `anyhow::Error`; callers treat it as "no data for this symbol".

use std::future::Future;

use anyhow::Result;

use super::{Candle, PriceVolume, Quote, RequestBudget, SnapshotRow, TradePrint};

pub trait MarketDataSource: Sync {
    /// Intraday quote including the five-level book.
    fn quote(&self, symbol: &str) -> impl Future<Output = Result<Quote>> + Send;

    /// Daily candles covering the last `lookback_days` calendar days,
    /// oldest first.
    fn daily_candles(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Today's intraday candles at `timeframe_minutes` resolution, oldest first.
    fn intraday_candles(
        &self,
        symbol: &str,
        timeframe_minutes: u32,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Most recent `limit` prints, newest first.
    fn trades(&self, symbol: &str, limit: u32) -> impl Future<Output = Result<Vec<TradePrint>>> + Send;

    /// Today's volume at each traded price, in feed order.
    fn volumes(&self, symbol: &str) -> impl Future<Output = Result<Vec<PriceVolume>>> + Send;

    /// Display name of a symbol.
    fn ticker_name(&self, symbol: &str) -> impl Future<Output = Result<String>> + Send;

    /// Snapshot of every common stock on `market` (e.g. "TSE").
    fn market_snapshot(&self, market: &str) -> impl Future<Output = Result<Vec<SnapshotRow>>> + Send;

    /// Normally trading equities listed on `exchange` (e.g. "TWSE").  Rows
    /// carry symbol and name only.
    fn tickers(&self, exchange: &str) -> impl Future<Output = Result<Vec<SnapshotRow>>> + Send;

    /// Budget every request of this source draws from, if it has one.
    fn request_budget(&self) -> Option<&RequestBudget> {
        None
    }
}

// ---------------------------------------------------------------------------
// In-memory source for tests
// ---------------------------------------------------------------------------
