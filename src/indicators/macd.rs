// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   DIF  = EMA(fast) - EMA(slow)       (fast series trimmed to align)
//   MACD = EMA(signal) of DIF
//   OSC  = DIF - MACD
//
// EMA(fast) starts `slow - fast` inputs earlier than EMA(slow), so its first
// `slow - fast` values are dropped before the pointwise difference.
// =============================================================================

use serde::Serialize;

use super::ema::calculate_ema;
use super::{require, tail, IndicatorResult, Unavailable};

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
pub const SIGNAL_PERIOD: usize = 9;

/// Number of trailing values kept in the `*_history` fields.
const HISTORY_LEN: usize = 5;

/// Latest MACD reading plus a short trailing history of each line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdResult {
    pub dif: f64,
    pub macd: f64,
    pub osc: f64,
    pub dif_history: Vec<f64>,
    pub macd_history: Vec<f64>,
    pub osc_history: Vec<f64>,
}

impl MacdResult {
    /// How many of {DIF > MACD, DIF and MACD both above zero, OSC > 0} hold.
    pub fn bullish_conditions(&self) -> usize {
        [
            self.dif > self.macd,
            self.dif > 0.0 && self.macd > 0.0,
            self.osc > 0.0,
        ]
        .iter()
        .filter(|&&c| c)
        .count()
    }
}

/// Standard 12/26/9 MACD.
pub fn calculate_macd(closes: &[f64]) -> IndicatorResult<MacdResult> {
    calculate_macd_with(closes, FAST_PERIOD, SLOW_PERIOD, SIGNAL_PERIOD)
}

/// MACD with explicit periods.  `fast` must be shorter than `slow`.
pub fn calculate_macd_with(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> IndicatorResult<MacdResult> {
    if fast == 0 || signal == 0 || fast >= slow {
        return Err(Unavailable::InvalidPeriod { indicator: "macd" });
    }
    require("macd", slow, slow, closes.len())?;

    let ema_fast = calculate_ema(closes, fast)?;
    let ema_slow = calculate_ema(closes, slow)?;

    let offset = slow - fast;
    let dif: Vec<f64> = ema_fast[offset..]
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    if dif.len() < signal {
        return Err(Unavailable::InsufficientHistory {
            indicator: "macd",
            required: slow + signal - 1,
            available: closes.len(),
        });
    }

    let macd = calculate_ema(&dif, signal)?;
    let dif_aligned = &dif[dif.len() - macd.len()..];
    let osc: Vec<f64> = dif_aligned
        .iter()
        .zip(macd.iter())
        .map(|(d, m)| d - m)
        .collect();

    let (Some(&d), Some(&m), Some(&o)) = (dif_aligned.last(), macd.last(), osc.last()) else {
        return Err(Unavailable::InsufficientHistory {
            indicator: "macd",
            required: slow + signal - 1,
            available: closes.len(),
        });
    };
    if !(d.is_finite() && m.is_finite() && o.is_finite()) {
        return Err(Unavailable::NonFinite { indicator: "macd" });
    }

    Ok(MacdResult {
        dif: d,
        macd: m,
        osc: o,
        dif_history: tail(dif_aligned, HISTORY_LEN),
        macd_history: tail(&macd, HISTORY_LEN),
        osc_history: tail(&osc, HISTORY_LEN),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn macd_unavailable_below_slow_period() {
        for n in 0..26 {
            assert!(calculate_macd(&wave(n)).is_err(), "n = {n}");
        }
    }

    #[test]
    fn macd_needs_nine_dif_points() {
        // 33 closes => 8 DIF points.
        assert!(matches!(
            calculate_macd(&wave(33)),
            Err(Unavailable::InsufficientHistory { .. })
        ));
        assert!(calculate_macd(&wave(34)).is_ok());
    }

    #[test]
    fn macd_finite_from_35_points() {
        for n in 35..120 {
            let r = calculate_macd(&wave(n)).unwrap();
            assert!(r.dif.is_finite() && r.macd.is_finite() && r.osc.is_finite());
            assert!((r.osc - (r.dif - r.macd)).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_alignment_matches_manual_difference() {
        let closes = wave(60);
        let r = calculate_macd(&closes).unwrap();
        let e12 = calculate_ema(&closes, 12).unwrap();
        let e26 = calculate_ema(&closes, 26).unwrap();
        let expected_dif = e12.last().unwrap() - e26.last().unwrap();
        assert!((r.dif - expected_dif).abs() < 1e-12);
        assert_eq!(r.dif_history.len(), 5);
    }

    #[test]
    fn macd_constant_series_is_flat() {
        let r = calculate_macd(&vec![50.0; 40]).unwrap();
        assert!(r.dif.abs() < 1e-9);
        assert!(r.macd.abs() < 1e-9);
        assert!(r.osc.abs() < 1e-9);
    }

    #[test]
    fn macd_rising_series_is_positive() {
        let closes: Vec<f64> = (100..140).map(|x| x as f64).collect();
        let r = calculate_macd(&closes).unwrap();
        assert!(r.dif > 0.0);
        assert!(r.macd > 0.0);
        assert!(r.bullish_conditions() >= 1);
    }

    #[test]
    fn macd_rejects_inverted_periods() {
        assert!(matches!(
            calculate_macd_with(&wave(60), 26, 12, 9),
            Err(Unavailable::InvalidPeriod { .. })
        ));
    }
}
