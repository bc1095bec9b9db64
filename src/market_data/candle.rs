use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar.  Volume is in lots (1 lot = 1000 shares).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// (H + L + C) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Usable for indicator input: every price positive and finite.
    pub fn is_valid(&self) -> bool {
        [self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }
}

/// Column view over an ordered candle slice, the shape the indicator
/// functions consume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceColumns {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
}

impl PriceColumns {
    /// Split candles into columns, dropping rows that fail [`Candle::is_valid`].
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut cols = Self::default();
        for c in candles.iter().filter(|c| c.is_valid()) {
            cols.highs.push(c.high);
            cols.lows.push(c.low);
            cols.closes.push(c.close);
        }
        cols
    }

    /// Number of rows kept.
    pub fn rows(&self) -> usize {
        self.closes.len()
    }
}

/// Sort in place by timestamp (oldest first) and drop duplicate timestamps,
/// keeping the last occurrence.
pub fn sort_chronological(candles: &mut Vec<Candle>) {
    candles.sort_by_key(|c| c.timestamp);
    let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => deduped.push(candle),
        }
    }
    *candles = deduped;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> Candle {
        Candle::new(ts, close, close + 1.0, close - 1.0, close, 100)
    }

    #[test]
    fn typical_price() {
        let c = Candle::new(0, 10.0, 12.0, 9.0, 11.0, 5);
        assert!((c.typical_price() - 32.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn columns_skip_invalid_rows() {
        let candles = vec![
            bar(0, 100.0),
            Candle::new(1, 0.0, 0.0, 0.0, 0.0, 0),
            bar(2, 101.0),
            Candle::new(3, 1.0, f64::NAN, 1.0, 1.0, 1),
        ];
        let cols = PriceColumns::from_candles(&candles);
        assert_eq!(cols.closes, vec![100.0, 101.0]);
        assert_eq!(cols.highs, vec![101.0, 102.0]);
        assert_eq!(cols.rows(), 2);
    }

    #[test]
    fn sort_reverses_newest_first_input() {
        let mut candles = vec![bar(3, 103.0), bar(2, 102.0), bar(1, 101.0)];
        sort_chronological(&mut candles);
        let ts: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![1, 2, 3]);
    }

    #[test]
    fn sort_keeps_last_duplicate() {
        let mut candles = vec![bar(1, 100.0), bar(2, 101.0), bar(2, 105.0)];
        sort_chronological(&mut candles);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 105.0);
    }
}
