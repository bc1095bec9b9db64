// =============================================================================
// Order Book Snapshot — five-level quote book at a point in time
// =============================================================================

use serde::{Deserialize, Serialize};

/// One resting price level.  Size is in lots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: u64,
}

impl BookLevel {
    pub fn new(price: f64, size: u64) -> Self {
        Self { price, size }
    }
}

/// Bids and asks ordered best-to-worst, plus the last traded price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub last_price: f64,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>, last_price: f64) -> Self {
        Self {
            bids,
            asks,
            last_price,
        }
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Total resting size on each side: (bid, ask).
    pub fn total_sizes(&self) -> (u64, u64) {
        (
            self.bids.iter().map(|l| l.size).sum(),
            self.asks.iter().map(|l| l.size).sum(),
        )
    }

    /// Best ask minus best bid, when both are positive.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) if b.price > 0.0 && a.price > 0.0 => Some(a.price - b.price),
            _ => None,
        }
    }

    /// Restore best-first ordering: bids descending, asks ascending.
    /// Levels with a non-positive price are removed.
    pub fn normalize(&mut self) {
        self.bids.retain(|l| l.price > 0.0 && l.price.is_finite());
        self.asks.retain(|l| l.price > 0.0 && l.price.is_finite());
        self.bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
}
