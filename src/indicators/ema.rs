// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

use super::{require, IndicatorResult, Unavailable};

/// Compute the EMA series for the given `values` slice and look-back `period`.
///
/// Each output element corresponds to an input starting at index `period - 1`,
/// so the series length is `values.len() - period + 1`.
///
/// # Edge cases
/// - `period == 0` => `InvalidPeriod`
/// - `values.len() < period` => `InsufficientHistory`
/// - Any non-finite intermediate value => `NonFinite`.  A truncated series would
///   break the suffix alignment MACD relies on, so the whole series is dropped.
pub fn calculate_ema(values: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    require("ema", period, period, values.len())?;

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Err(Unavailable::NonFinite { indicator: "ema" });
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &value in &values[period..] {
        let ema = value * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            return Err(Unavailable::NonFinite { indicator: "ema" });
        }
        result.push(ema);
        prev_ema = ema;
    }

    Ok(result)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_err());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(
            calculate_ema(&[1.0, 2.0, 3.0], 0),
            Err(Unavailable::InvalidPeriod { indicator: "ema" })
        );
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(matches!(
            calculate_ema(&[1.0, 2.0], 5),
            Err(Unavailable::InsufficientHistory { required: 5, available: 2, .. })
        ));
    }

    #[test]
    fn ema_period_equals_length() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3).unwrap();
        assert_eq!(ema.len(), 1);
        // Should be the SMA = (2+4+6)/3 = 4.0
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1..=10]: SMA seed = 3.0, multiplier = 1/3
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5).unwrap();
        assert_eq!(ema.len(), 6);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        let mut expected_vec = vec![expected];
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
            expected_vec.push(expected);
        }
        for (a, b) in ema.iter().zip(expected_vec.iter()) {
            assert!((a - b).abs() < 1e-10, "got {a}, expected {b}");
        }
    }

    #[test]
    fn ema_constant_series() {
        let closes = vec![57.3; 40];
        for v in calculate_ema(&closes, 12).unwrap() {
            assert!((v - 57.3).abs() < 1e-9);
        }
    }

    #[test]
    fn ema_nan_in_input_is_unavailable() {
        let closes = vec![1.0, 2.0, 3.0, f64::NAN, 5.0];
        assert_eq!(
            calculate_ema(&closes, 3),
            Err(Unavailable::NonFinite { indicator: "ema" })
        );
    }
}
