// =============================================================================
// Simple Moving Average (MA)
// =============================================================================
//
//   MA_i = mean(closes[i - period + 1 ..= i])
//
// The output is aligned to the suffix of the input: element 0 corresponds to
// close index `period - 1`.
// =============================================================================

use super::{require, IndicatorResult, Unavailable};

/// Compute the trailing simple moving average series.
///
/// Uses a running sum so the whole series is O(n).
pub fn calculate_sma(closes: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    require("ma", period, period, closes.len())?;

    let period_f = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / period_f);
    }

    if result.iter().any(|v| !v.is_finite()) {
        return Err(Unavailable::NonFinite { indicator: "ma" });
    }
    Ok(result)
}

/// Most recent MA value.
pub fn current_sma(closes: &[f64], period: usize) -> IndicatorResult<f64> {
    let series = calculate_sma(closes, period)?;
    series
        .last()
        .copied()
        .ok_or(Unavailable::InsufficientHistory {
            indicator: "ma",
            required: period,
            available: closes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_insufficient_data() {
        let err = calculate_sma(&[1.0, 2.0, 3.0], 5).unwrap_err();
        assert!(matches!(
            err,
            Unavailable::InsufficientHistory { required: 5, available: 3, .. }
        ));
    }

    #[test]
    fn sma_period_zero() {
        assert!(matches!(
            calculate_sma(&[1.0], 0),
            Err(Unavailable::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn sma_length_and_values() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ma = calculate_sma(&closes, 5).unwrap();
        assert_eq!(ma.len(), 6);
        assert!((ma[0] - 3.0).abs() < 1e-10);
        assert!((ma[5] - 8.0).abs() < 1e-10);
    }

    #[test]
    fn sma_constant_series() {
        let closes = vec![42.5; 30];
        for v in calculate_sma(&closes, 10).unwrap() {
            assert!((v - 42.5).abs() < 1e-10);
        }
    }

    #[test]
    fn current_sma_matches_tail_window() {
        let closes: Vec<f64> = (100..140).map(|x| x as f64).collect();
        let ma5 = current_sma(&closes, 5).unwrap();
        assert!((ma5 - 137.0).abs() < 1e-10);
    }

    #[test]
    fn sma_nan_is_unavailable() {
        let closes = vec![1.0, f64::NAN, 3.0, 4.0];
        assert!(matches!(
            calculate_sma(&closes, 2),
            Err(Unavailable::NonFinite { .. })
        ));
    }
}
