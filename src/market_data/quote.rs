use serde::{Deserialize, Serialize};

use super::orderbook::OrderBookSnapshot;

/// Intraday quote for one symbol.  Prices the feed did not supply are 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub last_price: f64,
    pub avg_price: f64,
    pub previous_close: f64,
    pub reference_price: f64,
    pub change: f64,
    pub change_percent: f64,
    /// Total traded volume for the day, in lots.
    pub trade_volume: u64,
    pub book: OrderBookSnapshot,
}

impl Quote {
    /// Last traded price, falling back to the close price.
    pub fn current_price(&self) -> Option<f64> {
        [self.last_price, self.close_price]
            .into_iter()
            .find(|p| p.is_finite() && *p > 0.0)
    }

    /// Reference price for range calculations, falling back to previous close.
    pub fn reference(&self) -> Option<f64> {
        [self.reference_price, self.previous_close]
            .into_iter()
            .find(|p| p.is_finite() && *p > 0.0)
    }
}

/// One row of the market-wide snapshot used to build the screening universe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub symbol: String,
    pub name: String,
    pub close_price: f64,
    pub change_percent: f64,
    /// Day volume in lots.
    pub trade_volume: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_price_falls_back_to_close() {
        let q = Quote {
            last_price: 0.0,
            close_price: 52.3,
            ..Default::default()
        };
        assert_eq!(q.current_price(), Some(52.3));
    }

    #[test]
    fn current_price_none_when_missing() {
        assert_eq!(Quote::default().current_price(), None);
    }

    #[test]
    fn reference_prefers_reference_price() {
        let q = Quote {
            reference_price: 10.0,
            previous_close: 9.0,
            ..Default::default()
        };
        assert_eq!(q.reference(), Some(10.0));
    }
}
