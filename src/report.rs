// =============================================================================
// Report Renderer — plain-text and JSON views of analysis results
// =============================================================================
//
// The pipeline only produces structured values; everything a person reads is
// formatted here.  Missing readings print as "n/a (<reason>)".

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::analysis::{Availability, RecentTrade, SymbolAnalysis};
use crate::indicators::kd::KdCross;
use crate::market_data::{OrderBookSnapshot, PriceVolume};
use crate::overview::{MarketOverview, OverviewLine};
use crate::screener::intraday::OpenGap;
use crate::screener::universe::UniverseOrigin;
use crate::screener::ScreenReport;

const RULE: &str = "────────────────────────────────────────────────────────";

/// Pretty JSON for `--json` output.
pub fn render_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialise report to JSON")
}

fn price_or_na(v: &Availability<f64>) -> String {
    match v {
        Availability::Available { value } => format!("{value:.2}"),
        Availability::Unavailable { reason } => format!("n/a ({reason})"),
    }
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.decimals$}"))
}

/// Taipei wall-clock time of an epoch-microsecond stamp.
fn clock(micros: i64) -> String {
    let taipei = FixedOffset::east_opt(8 * 3600);
    match (DateTime::from_timestamp_micros(micros), taipei) {
        (Some(t), Some(tz)) if micros > 0 => t.with_timezone(&tz).format("%H:%M:%S").to_string(),
        _ => "--:--:--".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Market overview
// ---------------------------------------------------------------------------

pub fn render_overview(o: &MarketOverview) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_overview(&mut out, o);
    out
}

fn write_overview_line(out: &mut String, line: &OverviewLine, decimals: usize) -> std::fmt::Result {
    let label = format!("{} {}", line.symbol, line.name);
    writeln!(
        out,
        "  {label:<16} {:>10}  {:+.decimals$} ({:+.2}%)",
        opt(line.price, 2),
        line.change,
        line.change_percent
    )
}

fn write_overview(out: &mut String, o: &MarketOverview) -> std::fmt::Result {
    writeln!(out, "[Market]")?;
    if let Some(index) = &o.index {
        write_overview_line(out, index, 0)?;
    }
    for line in &o.bellwethers {
        write_overview_line(out, line, 1)?;
    }
    if !o.unavailable.is_empty() {
        writeln!(out, "  unavailable: {}", o.unavailable.join(", "))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Single symbol
// ---------------------------------------------------------------------------

pub fn render_analysis(a: &SymbolAnalysis) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_analysis(&mut out, a);
    out
}

fn write_analysis(out: &mut String, a: &SymbolAnalysis) -> std::fmt::Result {
    let q = &a.quote;
    let ind = &a.indicators;
    let interp = &a.interpretation;

    writeln!(out, "{RULE}")?;
    writeln!(out, "{} {}", a.symbol, a.name)?;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "price {}  change {:+.2} ({:+.2}%)  volume {} lots",
        opt(q.price, 2),
        q.change,
        q.change_percent,
        q.volume
    )?;
    writeln!(
        out,
        "open {:.2}  high {:.2}  low {:.2}  prev close {:.2}",
        q.open, q.high, q.low, q.previous_close
    )?;

    writeln!(out)?;
    writeln!(out, "[Moving averages]  ({} daily candles)", ind.daily_candles)?;
    writeln!(out, "  MA5  {}", price_or_na(&ind.ma5))?;
    writeln!(out, "  MA10 {}", price_or_na(&ind.ma10))?;
    writeln!(out, "  MA20 {}", price_or_na(&ind.ma20))?;
    if let Some(ma) = &interp.ma {
        writeln!(out, "  {ma} (MA5 deviation {:+.2}%)", ma.ma5_deviation_pct)?;
    }

    writeln!(out)?;
    writeln!(out, "[Momentum]")?;
    match &ind.rsi {
        Availability::Available { value } => {
            writeln!(out, "  RSI(14) {:.2}  {}", value.value, value.zone)?
        }
        Availability::Unavailable { reason } => writeln!(out, "  RSI(14) n/a ({reason})")?,
    }
    match &ind.macd {
        Availability::Available { value } => {
            writeln!(
                out,
                "  MACD  DIF {:.3}  MACD {:.3}  OSC {:+.3}",
                value.dif, value.macd, value.osc
            )?;
            if let Some(reading) = &interp.macd {
                writeln!(out, "        {}: {}", reading.signal, reading.detail)?;
            }
        }
        Availability::Unavailable { reason } => writeln!(out, "  MACD  n/a ({reason})")?,
    }
    match &ind.kd {
        Availability::Available { value } => {
            let cross = match value.cross {
                KdCross::Golden => "  golden cross",
                KdCross::Death => "  death cross",
                KdCross::None => "",
            };
            let zone = interp.kd.map(|z| format!("  {z}")).unwrap_or_default();
            writeln!(out, "  KD    K {:.2}  D {:.2}{zone}{cross}", value.k, value.d)?;
        }
        Availability::Unavailable { reason } => writeln!(out, "  KD    n/a ({reason})")?,
    }

    writeln!(out)?;
    writeln!(out, "[Bands & VWAP]")?;
    match &ind.bollinger {
        Availability::Available { value } => {
            let zone = interp.bollinger.map(|z| format!("  {z}")).unwrap_or_default();
            writeln!(
                out,
                "  Bollinger {:.2} / {:.2} / {:.2}  position {:.0}%  squeeze {:.2}%{zone}",
                value.upper,
                value.middle,
                value.lower,
                value.position * 100.0,
                value.squeeze * 100.0
            )?;
        }
        Availability::Unavailable { reason } => writeln!(out, "  Bollinger n/a ({reason})")?,
    }
    write!(out, "  VWAP {}", price_or_na(&ind.vwap))?;
    match ind.vwap_deviation_pct {
        Some(dev) => writeln!(out, "  (price {dev:+.2}%)")?,
        None => writeln!(out)?,
    }

    writeln!(out)?;
    writeln!(out, "[Order book]")?;
    match &a.order_book {
        Availability::Available { value: b } => {
            writeln!(
                out,
                "  bid {:.1}% / ask {:.1}%  {}  (resting {} / {} lots)",
                b.bid_ratio, b.ask_ratio, b.sentiment, b.total_bid_size, b.total_ask_size
            )?;
            if let (Some(spread), Some(pct)) = (b.spread, b.spread_pct) {
                writeln!(out, "  spread {spread:.2} ({pct:.2}%)")?;
            }
        }
        Availability::Unavailable { reason } => writeln!(out, "  n/a ({reason})")?,
    }
    for signal in &a.queue_signals {
        writeln!(out, "  ! {signal}")?;
    }
    write_book(out, &a.book, a.quote.price)?;

    writeln!(out)?;
    writeln!(out, "[Block trades]")?;
    match &a.block_flow {
        Availability::Available { value: f } => {
            writeln!(
                out,
                "  {} prints ≥ {} lots, {} lots total  buy {:.1}% / sell {:.1}%  {}",
                f.block_count, f.threshold, f.total_volume, f.buy_ratio, f.sell_ratio, f.bias
            )?;
            if f.unclassified_volume > 0 {
                writeln!(out, "  unclassified {} lots", f.unclassified_volume)?;
            }
            for p in &f.sample {
                let side = p.side.map_or_else(|| "?".to_string(), |s| s.to_string());
                writeln!(out, "    {:.2} x {} lots  {side}", p.price, p.size)?;
            }
        }
        Availability::Unavailable { reason } => writeln!(out, "  n/a ({reason})")?,
    }
    write_recent_trades(out, &a.recent_trades)?;

    if let Some(volumes) = &a.price_volumes {
        writeln!(out)?;
        writeln!(out, "[Price volume]")?;
        match volumes {
            Availability::Available { value } => write_price_volumes(out, value)?,
            Availability::Unavailable { reason } => writeln!(out, "  n/a ({reason})")?,
        }
    }

    writeln!(out)?;
    writeln!(out, "[Score]")?;
    for rule in &a.score.rules {
        writeln!(out, "  {:<14} {}/{}", rule.name, rule.points, rule.max)?;
    }
    for skipped in &a.score.skipped {
        writeln!(out, "  {:<14} skipped ({})", skipped.name, skipped.reason)?;
    }
    match (a.score.percentage, a.score.bucket) {
        (Some(pct), Some(bucket)) => writeln!(
            out,
            "  strength {pct:.1}% ({}/{})  {bucket}",
            a.score.awarded, a.score.possible
        )?,
        _ => writeln!(out, "  strength n/a (no rule could be evaluated)")?,
    }
    writeln!(out, "{RULE}")
}

/// Asks from the fifth level down to the best, the current price, then
/// bids from the best down.
fn write_book(out: &mut String, book: &OrderBookSnapshot, price: Option<f64>) -> std::fmt::Result {
    if book.is_empty() {
        return Ok(());
    }
    for (i, level) in book.asks.iter().enumerate().rev() {
        writeln!(out, "  ask{} {:>9.2} {:>6} lots", i + 1, level.price, level.size)?;
    }
    writeln!(out, "  ---- {:>9}", opt(price, 2))?;
    for (i, level) in book.bids.iter().enumerate() {
        writeln!(out, "  bid{} {:>9.2} {:>6} lots", i + 1, level.price, level.size)?;
    }
    Ok(())
}

fn write_recent_trades(out: &mut String, trades: &[RecentTrade]) -> std::fmt::Result {
    if trades.is_empty() {
        return Ok(());
    }
    writeln!(out, "  recent:")?;
    for t in trades {
        let mark = if t.block { " *" } else { "" };
        writeln!(out, "    {} {:>9.2} {:>6} lots{mark}", clock(t.time), t.price, t.size)?;
    }
    Ok(())
}

fn write_price_volumes(out: &mut String, rows: &[PriceVolume]) -> std::fmt::Result {
    if rows.is_empty() {
        return writeln!(out, "  no trades yet");
    }
    writeln!(out, "  {:>9} {:>8} {:>8} {:>8}", "price", "volume", "at bid", "at ask")?;
    for r in rows {
        writeln!(
            out,
            "  {:>9.2} {:>8} {:>8} {:>8}",
            r.price, r.volume, r.volume_at_bid, r.volume_at_ask
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Screen
// ---------------------------------------------------------------------------

/// Text table of a screen run, showing at most `limit` hits.
pub fn render_screen(report: &ScreenReport, limit: usize) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_screen(&mut out, report, limit);
    out
}

fn write_screen(out: &mut String, r: &ScreenReport, limit: usize) -> std::fmt::Result {
    let ex = &r.excluded;
    writeln!(out, "{RULE}")?;
    if r.origin == UniverseOrigin::TickerList {
        writeln!(out, "snapshot unavailable: universe taken from the ticker list, no volume filter")?;
    }
    writeln!(
        out,
        "snapshot {}  candidates {}  excluded {} (listed {}, keyword {}, suspended {}, low volume {}, malformed {}, capped {})",
        r.snapshot_size,
        r.candidates,
        ex.total(),
        ex.listed,
        ex.keyword,
        ex.suspended,
        ex.low_volume,
        ex.malformed,
        ex.capped
    )?;
    writeln!(
        out,
        "hits {}  below range {}  failed {}  in {:.1}s",
        r.hits.len(),
        r.below_range.len(),
        r.failures.len(),
        r.elapsed_ms as f64 / 1000.0
    )?;
    writeln!(out, "{RULE}")?;

    if r.hits.is_empty() {
        writeln!(out, "no symbol passed the intraday range gate")?;
    } else {
        writeln!(
            out,
            "{:>3}  {:<7} {:<10} {:>9} {:>7} {:>8}  {:<16} tags",
            "#", "symbol", "name", "price", "range%", "score%", "bucket"
        )?;
        for (i, hit) in r.hits.iter().take(limit).enumerate() {
            let bucket = hit
                .analysis
                .score
                .bucket
                .map_or_else(|| "n/a".to_string(), |b| b.to_string());
            let mut tags: Vec<String> = hit.profile.tags.iter().map(|t| t.to_string()).collect();
            match hit.profile.gap {
                Some(OpenGap::Up) => tags.push("gap up".into()),
                Some(OpenGap::Down) => tags.push("gap down".into()),
                None => {}
            }
            writeln!(
                out,
                "{:>3}  {:<7} {:<10} {:>9} {:>7} {:>8}  {:<16} {}",
                i + 1,
                hit.symbol,
                hit.name,
                opt(hit.analysis.quote.price, 2),
                opt(hit.profile.range_pct, 2),
                opt(hit.analysis.percentage(), 1),
                bucket,
                tags.join(", ")
            )?;
        }
        if r.hits.len() > limit {
            writeln!(out, "… {} more", r.hits.len() - limit)?;
        }
    }

    if !r.failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "failures:")?;
        for f in &r.failures {
            writeln!(out, "  {}: {}", f.symbol, f.reason)?;
        }
    }
    Ok(())
}
