// =============================================================================
// Block-Trade Flow — aggressor split of large prints
// =============================================================================
//
// A block print is any trade of at least `threshold` lots.  Each block is
// sided by a `ClassificationPolicy`:
//
//   * tick rule:  an Up tick is a buy, a Down tick a sell; Flat is not a
//                side and falls through to the quote rule.
//   * quote rule: nearer the ask is a buy, nearer the bid a sell; an exact
//                midpoint resolves through the tie policy.  A missing or
//                non-positive bid/ask leaves the print unclassified.
//
// Volume that neither rule can side is counted as unclassified, never
// dropped, so buy + sell + unclassified == total block volume.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{IndicatorResult, Unavailable};
use crate::market_data::{TickHint, TradePrint};
use crate::types::{FlowBias, TradeSide};

pub const DEFAULT_BLOCK_THRESHOLD: u64 = 50;

/// How many block prints are kept as a sample in the result.
const SAMPLE_SIZE: usize = 5;

/// Which rule gets the first say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrder {
    #[default]
    TickFirst,
    QuoteFirst,
}

/// Side assigned to a print exactly at the bid/ask midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    #[default]
    Unclassified,
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    #[serde(default)]
    pub order: RuleOrder,
    #[serde(default)]
    pub tie: TiePolicy,
}

impl ClassificationPolicy {
    /// Side of a single print, or `None` when it cannot be classified.
    pub fn classify(&self, print: &TradePrint) -> Option<TradeSide> {
        match self.order {
            RuleOrder::TickFirst => tick_side(print).or_else(|| self.quote_side(print)),
            RuleOrder::QuoteFirst => self.quote_side(print).or_else(|| tick_side(print)),
        }
    }

    fn quote_side(&self, print: &TradePrint) -> Option<TradeSide> {
        let (bid, ask) = match (print.bid, print.ask) {
            (Some(b), Some(a)) if b > 0.0 && a > 0.0 => (b, a),
            _ => return None,
        };
        let to_ask = (ask - print.price).abs();
        let to_bid = (print.price - bid).abs();
        if to_ask < to_bid {
            Some(TradeSide::Buy)
        } else if to_bid < to_ask {
            Some(TradeSide::Sell)
        } else {
            match self.tie {
                TiePolicy::Unclassified => None,
                TiePolicy::Buy => Some(TradeSide::Buy),
                TiePolicy::Sell => Some(TradeSide::Sell),
            }
        }
    }
}

fn tick_side(print: &TradePrint) -> Option<TradeSide> {
    match print.tick? {
        TickHint::Up => Some(TradeSide::Buy),
        TickHint::Down => Some(TradeSide::Sell),
        TickHint::Flat => None,
    }
}

/// One block print as reported in the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPrint {
    pub time: i64,
    pub price: f64,
    pub size: u64,
    pub side: Option<TradeSide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFlow {
    pub threshold: u64,
    pub block_count: usize,
    pub total_volume: u64,
    pub buy_volume: u64,
    pub sell_volume: u64,
    pub unclassified_volume: u64,
    /// Buy share of total block volume, 0–100.
    pub buy_ratio: f64,
    /// Sell share of total block volume, 0–100.
    pub sell_ratio: f64,
    pub bias: FlowBias,
    /// The first few block prints in tape order.
    pub sample: Vec<BlockPrint>,
}

/// Aggregate the block prints of a tape.
///
/// Unavailable when no print reaches `threshold`.
pub fn block_trade_flow(
    trades: &[TradePrint],
    threshold: u64,
    policy: &ClassificationPolicy,
) -> IndicatorResult<BlockFlow> {
    let mut flow = BlockFlow {
        threshold,
        block_count: 0,
        total_volume: 0,
        buy_volume: 0,
        sell_volume: 0,
        unclassified_volume: 0,
        buy_ratio: 0.0,
        sell_ratio: 0.0,
        bias: FlowBias::Balanced,
        sample: Vec::with_capacity(SAMPLE_SIZE),
    };

    for print in trades.iter().filter(|t| t.size >= threshold) {
        let side = policy.classify(print);
        flow.block_count += 1;
        flow.total_volume += print.size;
        match side {
            Some(TradeSide::Buy) => flow.buy_volume += print.size,
            Some(TradeSide::Sell) => flow.sell_volume += print.size,
            None => flow.unclassified_volume += print.size,
        }
        if flow.sample.len() < SAMPLE_SIZE {
            flow.sample.push(BlockPrint {
                time: print.time,
                price: print.price,
                size: print.size,
                side,
            });
        }
    }

    if flow.block_count == 0 {
        return Err(Unavailable::NoBlockTrades { threshold });
    }

    if flow.total_volume > 0 {
        let total = flow.total_volume as f64;
        flow.buy_ratio = flow.buy_volume as f64 / total * 100.0;
        flow.sell_ratio = flow.sell_volume as f64 / total * 100.0;
    }
    flow.bias = match flow.buy_volume.cmp(&flow.sell_volume) {
        std::cmp::Ordering::Greater => FlowBias::NetBuy,
        std::cmp::Ordering::Less => FlowBias::NetSell,
        std::cmp::Ordering::Equal => FlowBias::Balanced,
    };

    debug!(
        blocks = flow.block_count,
        buy = flow.buy_volume,
        sell = flow.sell_volume,
        unclassified = flow.unclassified_volume,
        "block trade flow"
    );
    Ok(flow)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
