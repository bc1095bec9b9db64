// =============================================================================
// Symbol Analysis — fetch → indicators → microstructure → score
// =============================================================================
//
// The quote is the only required fetch: without it the symbol fails as a
// whole.  Daily candles, intraday candles and the trade tape are optional;
// when one of them cannot be fetched the indicators that read it are marked
// unavailable with the upstream cause and the rest of the analysis goes on.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::indicators::bollinger::BollingerResult;
use crate::indicators::kd::KdResult;
use crate::indicators::macd::MacdResult;
use crate::indicators::rsi::RsiZone;
use crate::indicators::{IndicatorResult, IndicatorSnapshot, Unavailable};
use crate::market_data::price_volume::top_by_price;
use crate::market_data::{MarketDataSource, OrderBookSnapshot, PriceVolume, Quote, TradePrint};
use crate::microstructure::{
    block_trade_flow, order_book_pressure, queue_signals, BlockFlow, BookPressure,
    ClassificationPolicy, QueueSignal, DEFAULT_BLOCK_THRESHOLD,
};
use crate::scoring::interpretation::{
    band_zone, kd_zone, ma_arrangement, macd_signal, BandZone, KdZone, MaArrangement, MacdReading,
};
use crate::scoring::{CompositeScorer, ScoreBreakdown, ScoreInputs, ScoreThresholds};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Knobs for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Calendar days of daily candles to request.
    pub lookback_days: u32,
    /// Resolution of the intraday candles used for VWAP.
    pub intraday_timeframe_minutes: u32,
    /// Number of recent prints to request for block-trade analysis.
    pub trade_limit: u32,
    /// Minimum print size, in lots, that counts as a block.
    pub block_threshold: u64,
    /// Rows of the price-volume table to keep; 0 skips the fetch.
    pub price_volume_levels: usize,
    /// Newest prints listed in the report.
    pub recent_trade_rows: usize,
    pub classification: ClassificationPolicy,
    pub thresholds: ScoreThresholds,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            intraday_timeframe_minutes: 1,
            trade_limit: 50,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            price_volume_levels: 5,
            recent_trade_rows: 5,
            classification: ClassificationPolicy::default(),
            thresholds: ScoreThresholds::default(),
        }
    }
}

impl AnalysisParams {
    /// Requests `analyze_quote` makes for a quote that already carries a name.
    pub fn request_count(&self) -> u32 {
        3 + u32::from(self.price_volume_levels > 0)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A reading or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability<T> {
    Available { value: T },
    Unavailable { reason: String },
}

impl<T> Availability<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }
}

impl<T: Clone> From<&IndicatorResult<T>> for Availability<T> {
    fn from(result: &IndicatorResult<T>) -> Self {
        match result {
            Ok(value) => Self::Available {
                value: value.clone(),
            },
            Err(cause) => Self::Unavailable {
                reason: cause.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub price: Option<f64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    /// Day volume in lots.
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiReading {
    pub value: f64,
    pub zone: RsiZone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorReport {
    pub daily_candles: usize,
    pub ma5: Availability<f64>,
    pub ma10: Availability<f64>,
    pub ma20: Availability<f64>,
    pub rsi: Availability<RsiReading>,
    pub macd: Availability<MacdResult>,
    pub kd: Availability<KdResult>,
    /// Band position is measured at the current price.
    pub bollinger: Availability<BollingerResult>,
    pub vwap: Availability<f64>,
    /// (price − VWAP) / VWAP × 100
    pub vwap_deviation_pct: Option<f64>,
}

/// One line of the recent-trades listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTrade {
    /// Epoch microseconds, 0 when the feed omitted it.
    pub time: i64,
    pub price: f64,
    pub size: u64,
    /// Size at or above the block threshold.
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Interpretations {
    pub ma: Option<MaArrangement>,
    pub macd: Option<MacdReading>,
    pub rsi: Option<RsiZone>,
    pub kd: Option<KdZone>,
    pub bollinger: Option<BandZone>,
}

/// Everything computed for one symbol in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolAnalysis {
    /// Unique identifier for this run (UUID v4).
    pub id: String,
    pub symbol: String,
    pub name: String,
    /// RFC 3339 timestamp of when the analysis was produced.
    pub created_at: String,
    pub quote: QuoteSummary,
    pub indicators: IndicatorReport,
    pub interpretation: Interpretations,
    /// Five-level book, best first on each side.
    pub book: OrderBookSnapshot,
    pub order_book: Availability<BookPressure>,
    pub queue_signals: Vec<QueueSignal>,
    pub block_flow: Availability<BlockFlow>,
    /// Newest first.
    pub recent_trades: Vec<RecentTrade>,
    /// Highest price first.  `None` when the table was not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_volumes: Option<Availability<Vec<PriceVolume>>>,
    pub score: ScoreBreakdown,
}

impl SymbolAnalysis {
    pub fn percentage(&self) -> Option<f64> {
        self.score.percentage
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full pipeline for `symbol`.
///
/// Returns `Err` only when the quote cannot be fetched.
#[instrument(skip(source, params), name = "analysis::analyze_symbol")]
pub async fn analyze_symbol<S: MarketDataSource>(
    source: &S,
    symbol: &str,
    params: &AnalysisParams,
) -> Result<SymbolAnalysis> {
    let mut quote = source
        .quote(symbol)
        .await
        .with_context(|| format!("quote for {symbol} unavailable"))?;
    if quote.symbol.is_empty() {
        quote.symbol = symbol.to_string();
    }
    Ok(analyze_quote(source, quote, params).await)
}

/// Continue the pipeline from an already fetched quote.  Every remaining
/// fetch is optional, so this cannot fail.
pub async fn analyze_quote<S: MarketDataSource>(
    source: &S,
    quote: Quote,
    params: &AnalysisParams,
) -> SymbolAnalysis {
    let symbol = quote.symbol.as_str();
    let volumes = async {
        if params.price_volume_levels == 0 {
            return None;
        }
        Some(source.volumes(symbol).await)
    };
    let (daily, intraday, trades, volumes) = tokio::join!(
        source.daily_candles(symbol, params.lookback_days),
        source.intraday_candles(symbol, params.intraday_timeframe_minutes),
        source.trades(symbol, params.trade_limit),
        volumes,
    );

    let intraday = intraday.unwrap_or_else(|e| {
        warn!(symbol, error = %e, "intraday candles unavailable");
        Vec::new()
    });

    let snapshot = match daily {
        Ok(candles) => IndicatorSnapshot::compute(&candles, &intraday),
        Err(e) => {
            warn!(symbol, error = %e, "daily candles unavailable");
            IndicatorSnapshot::without_daily(Unavailable::NoData(format!("daily candles: {e}")), &intraday)
        }
    };

    let name = if quote.name.is_empty() {
        source.ticker_name(symbol).await.unwrap_or_else(|e| {
            debug!(symbol, error = %e, "ticker name lookup failed");
            String::new()
        })
    } else {
        quote.name.clone()
    };

    let price = quote.current_price().or(snapshot.last_close);

    // ── Microstructure ─────────────────────────────────────────────────
    let mut book = quote.book.clone();
    if book.last_price <= 0.0 {
        if let Some(p) = price {
            book.last_price = p;
        }
    }
    let pressure = order_book_pressure(&book);
    let signals = queue_signals(&book, quote.previous_close);

    let flow = match &trades {
        Ok(tape) => block_trade_flow(tape, params.block_threshold, &params.classification),
        Err(e) => {
            warn!(symbol, error = %e, "trade tape unavailable");
            Err(Unavailable::NoData(format!("trades: {e}")))
        }
    };

    let recent_trades = match &trades {
        Ok(tape) => recent(tape, params),
        Err(_) => Vec::new(),
    };

    let price_volumes = volumes.map(|result| match result {
        Ok(rows) => Availability::Available {
            value: top_by_price(&rows, params.price_volume_levels),
        },
        Err(e) => {
            warn!(symbol, error = %e, "price-volume table unavailable");
            Availability::Unavailable {
                reason: format!("volumes: {e}"),
            }
        }
    });

    // ── Score ──────────────────────────────────────────────────────────
    let inputs = ScoreInputs::new(&snapshot, price, &pressure);
    let score = CompositeScorer::new(params.thresholds.clone()).score(&inputs);

    let analysis = SymbolAnalysis {
        id: uuid::Uuid::new_v4().to_string(),
        symbol: symbol.to_string(),
        name,
        created_at: chrono::Utc::now().to_rfc3339(),
        quote: summarize(&quote, price),
        indicators: report(&snapshot, price),
        interpretation: interpret(&snapshot, price),
        book: top_levels(&book, BOOK_DEPTH),
        order_book: Availability::from(&pressure),
        queue_signals: signals,
        block_flow: Availability::from(&flow),
        recent_trades,
        price_volumes,
        score,
    };

    info!(
        symbol,
        pct = ?analysis.score.percentage,
        awarded = analysis.score.awarded,
        possible = analysis.score.possible,
        "analysis complete"
    );
    analysis
}

/// Levels shown per side of the book.
const BOOK_DEPTH: usize = 5;

fn top_levels(book: &OrderBookSnapshot, depth: usize) -> OrderBookSnapshot {
    OrderBookSnapshot::new(
        book.bids.iter().take(depth).copied().collect(),
        book.asks.iter().take(depth).copied().collect(),
        book.last_price,
    )
}

fn recent(tape: &[TradePrint], params: &AnalysisParams) -> Vec<RecentTrade> {
    tape.iter()
        .take(params.recent_trade_rows)
        .map(|t| RecentTrade {
            time: t.time,
            price: t.price,
            size: t.size,
            block: t.size >= params.block_threshold,
        })
        .collect()
}

fn summarize(quote: &Quote, price: Option<f64>) -> QuoteSummary {
    QuoteSummary {
        price,
        open: quote.open_price,
        high: quote.high_price,
        low: quote.low_price,
        previous_close: quote.previous_close,
        change: quote.change,
        change_percent: quote.change_percent,
        volume: quote.trade_volume,
    }
}

fn report(snapshot: &IndicatorSnapshot, price: Option<f64>) -> IndicatorReport {
    let bollinger = snapshot.bollinger.clone().map(|mut b| {
        if let Some(p) = price {
            b.position = b.position_of(p);
        }
        b
    });
    let vwap_deviation_pct = match (&snapshot.vwap, price) {
        (Ok(vwap), Some(p)) if *vwap > 0.0 => Some((p - vwap) / vwap * 100.0),
        _ => None,
    };

    IndicatorReport {
        daily_candles: snapshot.daily_len,
        ma5: Availability::from(&snapshot.ma5),
        ma10: Availability::from(&snapshot.ma10),
        ma20: Availability::from(&snapshot.ma20),
        rsi: Availability::from(
            &snapshot
                .rsi
                .clone()
                .map(|(value, zone)| RsiReading { value, zone }),
        ),
        macd: Availability::from(&snapshot.macd),
        kd: Availability::from(&snapshot.kd),
        bollinger: Availability::from(&bollinger),
        vwap: Availability::from(&snapshot.vwap),
        vwap_deviation_pct,
    }
}

fn interpret(snapshot: &IndicatorSnapshot, price: Option<f64>) -> Interpretations {
    let ma = match (&snapshot.ma5, &snapshot.ma10, &snapshot.ma20, price) {
        (Ok(ma5), Ok(ma10), Ok(ma20), Some(p)) => Some(ma_arrangement(*ma5, *ma10, *ma20, p)),
        _ => None,
    };
    let bollinger = snapshot.bollinger.as_ref().ok().map(|b| {
        let position = price.map_or(b.position, |p| b.position_of(p));
        band_zone(position)
    });

    Interpretations {
        ma,
        macd: snapshot.macd.as_ref().ok().map(macd_signal),
        rsi: snapshot.rsi.as_ref().ok().map(|(_, zone)| *zone),
        kd: snapshot.kd.as_ref().ok().map(kd_zone),
        bollinger,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
