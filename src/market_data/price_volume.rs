// =============================================================================
// Price-Volume Table — today's volume traded at each price
// =============================================================================

use serde::{Deserialize, Serialize};

/// Volume traded at one price so far today.  Sizes are in lots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceVolume {
    pub price: f64,
    pub volume: u64,
    /// Traded at the bid (sell-initiated).
    pub volume_at_bid: u64,
    /// Traded at the ask (buy-initiated).
    pub volume_at_ask: u64,
}

/// The `n` highest price rows, highest first.  Rows without a usable price
/// are dropped.
pub fn top_by_price(rows: &[PriceVolume], n: usize) -> Vec<PriceVolume> {
    let mut sorted: Vec<PriceVolume> = rows
        .iter()
        .filter(|r| r.price.is_finite() && r.price > 0.0)
        .copied()
        .collect();
    sorted.sort_by(|a, b| b.price.total_cmp(&a.price));
    sorted.truncate(n);
    sorted
}
