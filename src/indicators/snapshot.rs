// =============================================================================
// Indicator Snapshot — every indicator for one symbol at one point in time
// =============================================================================

use tracing::debug;

use super::bollinger::{self, BollingerResult};
use super::kd::{self, KdResult};
use super::ma::current_sma;
use super::macd::{calculate_macd, MacdResult};
use super::rsi::{self, current_rsi, RsiZone};
use super::vwap::calculate_vwap;
use super::{IndicatorResult, Unavailable};
use crate::market_data::{Candle, PriceColumns};

/// Latest reading of each indicator.  A miss carries its cause.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    /// Number of usable daily candles the snapshot was computed from.
    pub daily_len: usize,
    pub last_close: Option<f64>,
    pub ma5: IndicatorResult<f64>,
    pub ma10: IndicatorResult<f64>,
    pub ma20: IndicatorResult<f64>,
    pub rsi: IndicatorResult<(f64, RsiZone)>,
    pub macd: IndicatorResult<MacdResult>,
    pub kd: IndicatorResult<KdResult>,
    pub bollinger: IndicatorResult<BollingerResult>,
    /// Computed from intraday candles.
    pub vwap: IndicatorResult<f64>,
}

impl IndicatorSnapshot {
    /// Compute every indicator from daily candles (oldest first) and the
    /// day's intraday candles.  Daily rows with a non-positive high, low or
    /// close are dropped first.
    pub fn compute(daily: &[Candle], intraday: &[Candle]) -> Self {
        let cols = PriceColumns::from_candles(daily);
        if cols.rows() < daily.len() {
            debug!(dropped = daily.len() - cols.rows(), "invalid daily candles removed");
        }

        Self {
            daily_len: cols.rows(),
            last_close: cols.closes.last().copied(),
            ma5: current_sma(&cols.closes, 5),
            ma10: current_sma(&cols.closes, 10),
            ma20: current_sma(&cols.closes, 20),
            rsi: current_rsi(&cols.closes, rsi::DEFAULT_PERIOD),
            macd: calculate_macd(&cols.closes),
            kd: kd::calculate_kd(
                &cols.highs,
                &cols.lows,
                &cols.closes,
                kd::DEFAULT_K_PERIOD,
                kd::DEFAULT_D_PERIOD,
            ),
            bollinger: bollinger::calculate_bollinger(
                &cols.closes,
                bollinger::DEFAULT_PERIOD,
                bollinger::DEFAULT_NUM_STD,
            ),
            vwap: calculate_vwap(intraday),
        }
    }

    /// Snapshot for a symbol whose daily history could not be fetched: every
    /// daily indicator carries `cause`, VWAP is still computed.
    pub fn without_daily(cause: Unavailable, intraday: &[Candle]) -> Self {
        Self {
            daily_len: 0,
            last_close: None,
            ma5: Err(cause.clone()),
            ma10: Err(cause.clone()),
            ma20: Err(cause.clone()),
            rsi: Err(cause.clone()),
            macd: Err(cause.clone()),
            kd: Err(cause.clone()),
            bollinger: Err(cause),
            vwap: calculate_vwap(intraday),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(i as i64 * 86_400_000, c - 0.5, c + 1.0, c - 1.0, c, 1_000)
            })
            .collect()
    }

    #[test]
    fn forty_rising_candles_define_everything() {
        let candles = rising(40);
        let snap = IndicatorSnapshot::compute(&candles, &candles);
        assert_eq!(snap.daily_len, 40);
        assert_eq!(snap.last_close, Some(139.0));
        assert_eq!(snap.ma5, Ok(137.0));
        assert!(snap.macd.is_ok());
        assert!(snap.bollinger.is_ok());
        assert!(snap.vwap.is_ok());
    }

    #[test]
    fn short_history_reports_causes() {
        let candles = rising(10);
        let snap = IndicatorSnapshot::compute(&candles, &[]);
        assert!(snap.ma10.is_ok());
        assert!(matches!(
            snap.ma20,
            Err(Unavailable::InsufficientHistory { required: 20, available: 10, .. })
        ));
        assert!(snap.rsi.is_err());
        assert!(snap.kd.is_ok());
        assert_eq!(snap.vwap, Err(Unavailable::NoVolume));
    }

    #[test]
    fn invalid_rows_are_dropped() {
        let mut candles = rising(6);
        candles[2].low = 0.0;
        let snap = IndicatorSnapshot::compute(&candles, &[]);
        assert_eq!(snap.daily_len, 5);
        assert!(snap.ma5.is_ok());
    }

    #[test]
    fn missing_daily_keeps_cause() {
        let intraday = rising(3);
        let cause = Unavailable::NoData("daily candles".into());
        let snap = IndicatorSnapshot::without_daily(cause.clone(), &intraday);
        assert_eq!(snap.macd, Err(cause));
        assert!(snap.vwap.is_ok());
    }
}
