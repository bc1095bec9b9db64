// =============================================================================
// Order-Book Pressure — proximity-weighted bid/ask strength
// =============================================================================
//
// Each visible level contributes `size × weight`, where
//
//   weight(i) = proximity × max(0, 1 − 0.15·i)
//   proximity = price / last   (bids)
//             = last / price   (asks)
//
// so levels close to the last trade and near the top of the book dominate.
// Levels with a non-positive price are skipped.  Strength ratios are in
// percent of the combined strength.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{IndicatorResult, Unavailable};
use crate::market_data::{BookLevel, OrderBookSnapshot};
use crate::types::BookSentiment;

/// Depth decay per level (level 0 has full weight, level 5 has 25 %).
const LEVEL_DECAY: f64 = 0.15;
const STRONG_RATIO: f64 = 65.0;
const LEANING_RATIO: f64 = 55.0;

/// Thresholds for the queue heuristics.
const ASK_WALL_MULTIPLE: u64 = 3;
const ASK_WALL_MIN_SIZE: u64 = 100;
const THIN_BID_MAX_SIZE: u64 = 50;
const RISING_FACTOR: f64 = 1.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookPressure {
    pub bid_strength: f64,
    pub ask_strength: f64,
    /// Bid share of the combined strength, 0–100.
    pub bid_ratio: f64,
    /// Ask share of the combined strength, 0–100.
    pub ask_ratio: f64,
    pub sentiment: BookSentiment,
    /// Raw resting size per side, in lots.
    pub total_bid_size: u64,
    pub total_ask_size: u64,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub spread: Option<f64>,
    /// Spread as a percentage of the last price.
    pub spread_pct: Option<f64>,
}

fn side_strength(levels: &[BookLevel], last: f64, is_bid: bool) -> f64 {
    levels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.price > 0.0 && l.price.is_finite())
        .map(|(i, l)| {
            let proximity = if is_bid { l.price / last } else { last / l.price };
            let depth = (1.0 - LEVEL_DECAY * i as f64).max(0.0);
            l.size as f64 * proximity * depth
        })
        .sum()
}

fn sentiment_of(bid_ratio: f64, ask_ratio: f64) -> BookSentiment {
    if bid_ratio > STRONG_RATIO {
        BookSentiment::StrongBuy
    } else if ask_ratio > STRONG_RATIO {
        BookSentiment::StrongSell
    } else if bid_ratio > LEANING_RATIO {
        BookSentiment::LeaningBuy
    } else if ask_ratio > LEANING_RATIO {
        BookSentiment::LeaningSell
    } else {
        BookSentiment::Balanced
    }
}

/// Weighted bid/ask pressure of a book snapshot.
///
/// Unavailable when both sides are empty, the last price is not positive, or
/// the combined weighted strength is zero.
pub fn order_book_pressure(book: &OrderBookSnapshot) -> IndicatorResult<BookPressure> {
    if book.is_empty() {
        return Err(Unavailable::EmptyBook);
    }
    let last = book.last_price;
    if !(last > 0.0 && last.is_finite()) {
        return Err(Unavailable::MissingPrice);
    }

    let bid_strength = side_strength(&book.bids, last, true);
    let ask_strength = side_strength(&book.asks, last, false);
    let total = bid_strength + ask_strength;
    if !total.is_finite() {
        return Err(Unavailable::NonFinite { indicator: "order book" });
    }
    if total <= 0.0 {
        return Err(Unavailable::ZeroStrength);
    }

    let bid_ratio = bid_strength / total * 100.0;
    let ask_ratio = ask_strength / total * 100.0;
    let sentiment = sentiment_of(bid_ratio, ask_ratio);
    let (total_bid_size, total_ask_size) = book.total_sizes();
    let spread = book.spread();

    debug!(bid_ratio, ask_ratio, %sentiment, "order book pressure");

    Ok(BookPressure {
        bid_strength,
        ask_strength,
        bid_ratio,
        ask_ratio,
        sentiment,
        total_bid_size,
        total_ask_size,
        best_bid: book.best_bid().map(|l| l.price),
        best_ask: book.best_ask().map(|l| l.price),
        spread,
        spread_pct: spread.map(|s| s / last * 100.0),
    })
}

// ---------------------------------------------------------------------------
// Queue heuristics
// ---------------------------------------------------------------------------

/// Notable shapes at the top of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueSignal {
    /// Best-ask size dwarfs best-bid size.
    AskWall,
    /// Price is up more than 1 % on a thin best bid.
    ThinBidRising,
}

impl std::fmt::Display for QueueSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AskWall => write!(f, "heavy ask wall above"),
            Self::ThinBidRising => write!(f, "rising on a thin bid"),
        }
    }
}

/// Flag queue shapes worth a second look.  `previous_close` of 0 disables the
/// rising check.
pub fn queue_signals(book: &OrderBookSnapshot, previous_close: f64) -> Vec<QueueSignal> {
    let mut signals = Vec::new();
    let bid1 = book.best_bid().map(|l| l.size).unwrap_or(0);
    let ask1 = book.best_ask().map(|l| l.size).unwrap_or(0);

    if ask1 > bid1.saturating_mul(ASK_WALL_MULTIPLE) && ask1 > ASK_WALL_MIN_SIZE {
        signals.push(QueueSignal::AskWall);
    }
    if bid1 < THIN_BID_MAX_SIZE
        && previous_close > 0.0
        && book.last_price > previous_close * RISING_FACTOR
    {
        signals.push(QueueSignal::ThinBidRising);
    }
    signals
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
