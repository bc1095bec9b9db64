// =============================================================================
// Screen Runner — bounded fan-out of the per-symbol pipeline
// =============================================================================
//
// Candidates are processed by at most `max_workers` concurrent pipelines.
// Each symbol runs under its own timeout; a symbol that fails or times out is
// logged and recorded, and its siblings carry on.
//
// The timeout covers upstream latency only.  Each stage of a symbol's
// pipeline reserves its requests from the source's budget first and starts
// its clock once the reservation is granted, so a spent budget delays a
// symbol without failing it.  Completion order is thrown
// away: hits are sorted by score (highest first, unscored last) and then by
// symbol, so two runs over the same data print the same table.
// =============================================================================

use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::intraday::{intraday_profile, IntradayProfile, ProfileThresholds};
use super::universe::{build_fallback_universe, build_universe, ExclusionCounts, UniverseFilter, UniverseOrigin};
use crate::analysis::{analyze_quote, AnalysisParams, SymbolAnalysis};
use crate::market_data::{MarketDataSource, Quote, SnapshotRow};

/// Upper bound on concurrent pipelines regardless of configuration.
pub const MAX_WORKERS: usize = 10;

/// Resolution of the candles used for the volume ratio.
const VOLUME_RATIO_TIMEFRAME: u32 = 5;

/// Requests made before the range gate: the quote and the 5-minute candles.
const GATE_REQUESTS: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenParams {
    /// Concurrent pipelines, clamped to 1..=10.
    pub max_workers: usize,
    pub symbol_timeout: Duration,
    pub universe: UniverseFilter,
    pub profile: ProfileThresholds,
    pub analysis: AnalysisParams,
}

impl Default for ScreenParams {
    fn default() -> Self {
        Self {
            max_workers: 5,
            symbol_timeout: Duration::from_secs(8),
            universe: UniverseFilter::default(),
            profile: ProfileThresholds::default(),
            analysis: AnalysisParams {
                price_volume_levels: 0,
                ..AnalysisParams::default()
            },
        }
    }
}

impl ScreenParams {
    pub fn workers(&self) -> usize {
        self.max_workers.clamp(1, MAX_WORKERS)
    }
}

/// A symbol that passed the range gate, with its full analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenHit {
    pub symbol: String,
    pub name: String,
    /// Day volume from the market snapshot, in lots.
    pub volume: u64,
    pub profile: IntradayProfile,
    pub analysis: SymbolAnalysis,
}

impl ScreenHit {
    pub fn percentage(&self) -> Option<f64> {
        self.analysis.percentage()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenFailure {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenReport {
    pub origin: UniverseOrigin,
    pub snapshot_size: usize,
    pub candidates: usize,
    pub excluded: ExclusionCounts,
    /// Sorted by percentage (descending, unscored last), then symbol.
    pub hits: Vec<ScreenHit>,
    /// Symbols analysed but below the range gate.
    pub below_range: Vec<String>,
    pub failures: Vec<ScreenFailure>,
    pub elapsed_ms: u64,
}

enum Outcome {
    Hit(Box<ScreenHit>),
    BelowRange,
}

/// Run `stage` with `slots` requests reserved from the source's budget and
/// `limit` measured from when the reservation is granted.  Returns the
/// output and the time the stage took, or `None` if it overran.
async fn budgeted_stage<S, F>(source: &S, slots: u32, limit: Duration, stage: F) -> Option<(F::Output, Duration)>
where
    S: MarketDataSource,
    F: Future,
{
    let timed = async {
        let started = Instant::now();
        let output = tokio::time::timeout(limit, stage).await.ok()?;
        Some((output, started.elapsed()))
    };
    match source.request_budget() {
        Some(budget) => {
            let reservation = budget.reserve(slots).await;
            debug!(slots = reservation.slots(), "requests reserved");
            reservation.run(timed).await
        }
        None => timed.await,
    }
}

/// Quote and intraday profile, or `None` below the range gate.
async fn gate<S: MarketDataSource>(
    source: &S,
    row: &SnapshotRow,
    params: &ScreenParams,
) -> Result<Option<(Quote, IntradayProfile)>> {
    let mut quote = source
        .quote(&row.symbol)
        .await
        .with_context(|| format!("quote for {}", row.symbol))?;
    if quote.symbol.is_empty() {
        quote.symbol = row.symbol.clone();
    }
    if quote.name.is_empty() {
        quote.name = row.name.clone();
    }

    let bars = source
        .intraday_candles(&row.symbol, VOLUME_RATIO_TIMEFRAME)
        .await
        .unwrap_or_else(|e| {
            debug!(symbol = %row.symbol, error = %e, "5-minute candles unavailable");
            Vec::new()
        });

    let profile = intraday_profile(&quote, &bars, &params.profile);
    if !profile.passes_range(params.profile.min_range_pct) {
        debug!(symbol = %row.symbol, range = ?profile.range_pct, "below range gate");
        return Ok(None);
    }
    Ok(Some((quote, profile)))
}

/// Stage two for a single candidate.
async fn screen_symbol<S: MarketDataSource>(
    source: &S,
    row: &SnapshotRow,
    params: &ScreenParams,
) -> Result<Outcome> {
    let timed_out = || anyhow!("timed out after {} ms", params.symbol_timeout.as_millis());

    let (gated, gate_time) = budgeted_stage(source, GATE_REQUESTS, params.symbol_timeout, gate(source, row, params))
        .await
        .ok_or_else(timed_out)?;
    let Some((quote, profile)) = gated? else {
        return Ok(Outcome::BelowRange);
    };

    let remaining = params.symbol_timeout.saturating_sub(gate_time);
    let (analysis, _) = budgeted_stage(
        source,
        params.analysis.request_count(),
        remaining,
        analyze_quote(source, quote, &params.analysis),
    )
    .await
    .ok_or_else(timed_out)?;

    Ok(Outcome::Hit(Box::new(ScreenHit {
        symbol: row.symbol.clone(),
        name: analysis.name.clone(),
        volume: row.trade_volume,
        profile,
        analysis,
    })))
}

/// Highest percentage first, unscored last, ties by symbol.
pub fn rank_hits(hits: &mut [ScreenHit]) {
    hits.sort_by(|a, b| {
        let by_score = match (a.percentage(), b.percentage()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_score.then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// Run stage two over an already filtered candidate list.
pub async fn run_screen<S: MarketDataSource>(
    source: &S,
    candidates: Vec<SnapshotRow>,
    params: &ScreenParams,
) -> (Vec<ScreenHit>, Vec<String>, Vec<ScreenFailure>) {
    let workers = params.workers();
    let total = candidates.len();
    info!(candidates = total, workers, timeout_ms = params.symbol_timeout.as_millis() as u64, "screen started");

    let results: Vec<(String, Result<Outcome>)> = futures_util::stream::iter(candidates)
        .map(|row| async move {
            let outcome = screen_symbol(source, &row, params).await;
            (row.symbol, outcome)
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut hits = Vec::new();
    let mut below_range = Vec::new();
    let mut failures = Vec::new();
    for (symbol, outcome) in results {
        match outcome {
            Ok(Outcome::Hit(hit)) => hits.push(*hit),
            Ok(Outcome::BelowRange) => below_range.push(symbol),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "symbol skipped");
                failures.push(ScreenFailure {
                    symbol,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    rank_hits(&mut hits);
    below_range.sort();
    failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    info!(
        hits = hits.len(),
        below_range = below_range.len(),
        failures = failures.len(),
        "screen finished"
    );
    (hits, below_range, failures)
}

/// Full screen: market snapshot (or ticker list) → universe filter → bounded
/// per-symbol pipeline.
pub async fn screen_market<S: MarketDataSource>(
    source: &S,
    market: &str,
    exclusion_list: &HashSet<String>,
    params: &ScreenParams,
) -> Result<ScreenReport> {
    let started = Instant::now();

    let universe = match source.market_snapshot(market).await {
        Ok(rows) => build_universe(rows, exclusion_list, &params.universe),
        Err(e) => {
            let exchange = &params.universe.fallback_exchange;
            warn!(market, error = %format!("{e:#}"), exchange = %exchange, "market snapshot unavailable — falling back to ticker list");
            let rows = source.tickers(exchange).await.with_context(|| {
                format!("market snapshot for {market} and ticker list for {exchange} both unavailable")
            })?;
            build_fallback_universe(rows, exclusion_list, &params.universe)
        }
    };
    let candidates = universe.candidates.len();

    let (hits, below_range, failures) = run_screen(source, universe.candidates, params).await;

    Ok(ScreenReport {
        origin: universe.origin,
        snapshot_size: universe.snapshot_size,
        candidates,
        excluded: universe.excluded,
        hits,
        below_range,
        failures,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::source::fake::FakeSource;
    use crate::market_data::{BookLevel, Candle, OrderBookSnapshot, RequestBudget};

    fn series(n: usize, start: f64, step: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = start + step * i as f64;
                Candle::new(i as i64 * 86_400_000, c, c + 1.0, c - 1.0, c, 1_000)
            })
            .collect()
    }

    fn active_quote(symbol: &str, last: f64) -> Quote {
        Quote {
            symbol: symbol.into(),
            name: format!("Co {symbol}"),
            open_price: last * 0.98,
            high_price: last * 1.01,
            low_price: last * 0.97,
            last_price: last,
            close_price: last,
            avg_price: last * 0.99,
            reference_price: last * 0.98,
            previous_close: last * 0.98,
            trade_volume: 5_000,
            book: OrderBookSnapshot::new(
                vec![BookLevel::new(last - 0.5, 100)],
                vec![BookLevel::new(last + 0.5, 100)],
                last,
            ),
            ..Default::default()
        }
    }

    fn row(symbol: &str, volume: u64) -> SnapshotRow {
        SnapshotRow {
            symbol: symbol.into(),
            name: format!("Co {symbol}"),
            close_price: 100.0,
            change_percent: 1.0,
            trade_volume: volume,
        }
    }

    /// "UP" rises, "DOWN" falls, "FLAT" is too quiet for the range gate.
    fn market() -> FakeSource {
        let mut src = FakeSource::default();
        src.quotes.insert("UP".into(), active_quote("UP", 139.0));
        src.daily.insert("UP".into(), series(40, 100.0, 1.0));
        src.quotes.insert("DOWN".into(), active_quote("DOWN", 61.0));
        src.daily.insert("DOWN".into(), series(40, 100.0, -1.0));
        src.quotes.insert(
            "FLAT".into(),
            Quote {
                symbol: "FLAT".into(),
                name: "Flat Co".into(),
                high_price: 50.1,
                low_price: 50.0,
                last_price: 50.0,
                reference_price: 50.0,
                ..Default::default()
            },
        );
        src.snapshot = vec![
            row("DOWN", 9_000),
            row("UP", 8_000),
            row("FLAT", 7_000),
            row("MISSING", 6_000),
            row("TINY", 100),
        ];
        src
    }

    #[test]
    fn workers_are_clamped() {
        let mut p = ScreenParams::default();
        assert_eq!(p.workers(), 5);
        p.max_workers = 0;
        assert_eq!(p.workers(), 1);
        p.max_workers = 64;
        assert_eq!(p.workers(), MAX_WORKERS);
    }

    #[tokio::test]
    async fn screen_ranks_hits_and_records_failures() {
        let src = market();
        let report = screen_market(&src, "TSE", &HashSet::new(), &ScreenParams::default())
            .await
            .unwrap();

        assert_eq!(report.snapshot_size, 5);
        assert_eq!(report.candidates, 4);
        assert_eq!(report.excluded.low_volume, 1);

        let ranked: Vec<&str> = report.hits.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(ranked, vec!["UP", "DOWN"]);
        assert!(report.hits[0].percentage() > report.hits[1].percentage());

        assert_eq!(report.below_range, vec!["FLAT".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "MISSING");
        assert!(report.failures[0].reason.contains("not found"));
    }

    #[tokio::test]
    async fn slow_symbol_times_out_without_blocking_siblings() {
        let mut src = market();
        src.delays.insert("DOWN".into(), Duration::from_secs(5));
        let params = ScreenParams {
            symbol_timeout: Duration::from_millis(200),
            max_workers: 2,
            ..Default::default()
        };

        let started = Instant::now();
        let candidates = vec![row("DOWN", 9_000), row("UP", 8_000)];
        let (hits, _, failures) = run_screen(&src, candidates, &params).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol, "UP");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn order_does_not_depend_on_completion_order() {
        let mut fast_first = market();
        fast_first.delays.insert("UP".into(), Duration::from_millis(50));
        let mut slow_first = market();
        slow_first.delays.insert("DOWN".into(), Duration::from_millis(50));

        let candidates = vec![row("UP", 8_000), row("DOWN", 9_000)];
        let params = ScreenParams::default();
        let (a, _, _) = run_screen(&fast_first, candidates.clone(), &params).await;
        let (b, _, _) = run_screen(&slow_first, candidates, &params).await;

        let order_a: Vec<&str> = a.iter().map(|h| h.symbol.as_str()).collect();
        let order_b: Vec<&str> = b.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(order_a, order_b);
        assert_eq!(order_a, vec!["UP", "DOWN"]);
    }

    #[tokio::test]
    async fn unscored_hits_sort_last_then_by_symbol() {
        let src = FakeSource::default();
        let mut hits = Vec::new();
        for (symbol, pct) in [
            ("B", None),
            ("C", Some(50.0)),
            ("A", None),
            ("D", Some(80.0)),
            ("E", Some(50.0)),
        ] {
            let quote = Quote {
                symbol: symbol.into(),
                ..Default::default()
            };
            let mut analysis = analyze_quote(&src, quote, &AnalysisParams::default()).await;
            analysis.score.percentage = pct;
            hits.push(ScreenHit {
                symbol: symbol.into(),
                name: String::new(),
                volume: 0,
                profile: intraday_profile(&Quote::default(), &[], &ProfileThresholds::default()),
                analysis,
            });
        }

        rank_hits(&mut hits);
        let order: Vec<&str> = hits.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(order, vec!["D", "C", "E", "A", "B"]);
    }

    /// `n` rising symbols that all pass the range gate.
    fn crowded_market(n: usize) -> (FakeSource, Vec<SnapshotRow>) {
        let mut src = FakeSource::default();
        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            let symbol = format!("S{i:02}");
            src.quotes.insert(symbol.clone(), active_quote(&symbol, 139.0));
            src.daily.insert(symbol.clone(), series(40, 100.0, 1.0));
            rows.push(row(&symbol, 10_000 - i as u64));
        }
        (src, rows)
    }

    #[tokio::test(start_paused = true)]
    async fn budget_waits_do_not_count_against_the_symbol_timeout() {
        let (mut src, candidates) = crowded_market(20);
        src.budget = Some(RequestBudget::new(11));
        let params = ScreenParams {
            symbol_timeout: Duration::from_millis(500),
            ..Default::default()
        };

        let started = Instant::now();
        let (hits, below_range, failures) = run_screen(&src, candidates, &params).await;

        assert!(failures.is_empty(), "unexpected failures: {failures:?}");
        assert!(below_range.is_empty());
        assert_eq!(hits.len(), 20);
        // 20 symbols at five requests each cannot fit in one 11-request minute.
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_still_times_out_under_a_budget() {
        let mut src = market();
        src.budget = Some(RequestBudget::new(55));
        src.delays.insert("DOWN".into(), Duration::from_secs(5));
        let params = ScreenParams {
            symbol_timeout: Duration::from_millis(200),
            ..Default::default()
        };

        let candidates = vec![row("DOWN", 9_000), row("UP", 8_000)];
        let (hits, _, failures) = run_screen(&src, candidates, &params).await;

        assert_eq!(hits.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].symbol, "DOWN");
        assert!(failures[0].reason.contains("timed out after 200 ms"));
    }

    #[tokio::test]
    async fn snapshot_failure_falls_back_to_ticker_list() {
        let mut src = market();
        src.snapshot_down = true;
        src.tickers = vec![
            row("UP", 0),
            row("0050", 0),
            SnapshotRow {
                symbol: "00679B".into(),
                name: "元大美債20年".into(),
                ..Default::default()
            },
            row("DOWN", 0),
        ];
        let excluded: HashSet<String> = ["0050".to_string()].into_iter().collect();

        let report = screen_market(&src, "TSE", &excluded, &ScreenParams::default())
            .await
            .unwrap();

        assert_eq!(report.origin, UniverseOrigin::TickerList);
        assert_eq!(report.snapshot_size, 4);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.excluded.listed, 1);
        assert_eq!(report.excluded.keyword, 1);
        let ranked: Vec<&str> = report.hits.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(ranked, vec!["UP", "DOWN"]);
    }

    #[tokio::test]
    async fn screen_analysis_fills_name_from_universe_row() {
        let mut src = market();
        if let Some(q) = src.quotes.get_mut("UP") {
            q.name.clear();
        }
        let (hits, _, _) = run_screen(&src, vec![row("UP", 8_000)], &ScreenParams::default()).await;
        assert_eq!(hits[0].name, "Co UP");
    }
}
