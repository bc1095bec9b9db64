// =============================================================================
// Trade Tape — recent prints for one symbol
// =============================================================================
//
// The tape is kept newest first, the order the intraday trades endpoint
// returns it in.  Aggregations over the tape do not depend on the order.

use serde::{Deserialize, Serialize};

/// Tick direction attached to a print by the feed, when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickHint {
    /// Uptick: the print lifted the offer.
    Up,
    /// Downtick: the print hit the bid.
    Down,
    /// Unchanged tick; carries no side.
    Flat,
}

impl TickHint {
    /// Interpret a raw tick marker.  Accepts the textual forms `up`/`plus`/`+`,
    /// `down`/`minus`/`-` and the numbers `1`/`-1`; any other present value is
    /// treated as a flat tick.  `null` means no hint at all.
    pub fn parse(raw: &serde_json::Value) -> Option<Self> {
        match raw {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(match s.trim().to_ascii_lowercase().as_str() {
                "up" | "plus" | "+" => Self::Up,
                "down" | "minus" | "-" => Self::Down,
                _ => Self::Flat,
            }),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(1) => Self::Up,
                Some(-1) => Self::Down,
                _ => Self::Flat,
            }),
            _ => Some(Self::Flat),
        }
    }
}

/// A single print.  Size is in lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePrint {
    /// Print time, epoch microseconds (0 when the feed omitted it).
    pub time: i64,
    pub price: f64,
    pub size: u64,
    pub tick: Option<TickHint>,
    /// Best bid recorded at print time.
    pub bid: Option<f64>,
    /// Best ask recorded at print time.
    pub ask: Option<f64>,
}

/// Builders for hand-written tapes.
#[cfg(test)]
impl TradePrint {
    pub fn new(price: f64, size: u64) -> Self {
        Self {
            time: 0,
            price,
            size,
            tick: None,
            bid: None,
            ask: None,
        }
    }

    pub fn with_tick(mut self, tick: TickHint) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn with_quotes(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }
}
