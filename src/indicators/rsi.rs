// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.  A zero
//          delta is a zero gain and a zero loss.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

use serde::Serialize;

use super::{require, IndicatorResult, Unavailable};

pub const DEFAULT_PERIOD: usize = 14;

/// Zone of the latest RSI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

impl RsiZone {
    pub fn of(value: f64) -> Self {
        if value > 70.0 {
            Self::Overbought
        } else if value < 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

/// Compute the full RSI series for the given `closes` and `period`.
///
/// The returned vector has one RSI value for each close starting at index
/// `period` (the first `period` deltas seed the averages).
///
/// # Edge cases
/// - `period == 0` => `InvalidPeriod`
/// - `closes.len() < period + 1` => `InsufficientHistory`
/// - Average loss of zero (no down moves in the smoothed window) => 100.0,
///   including the flat case.
pub fn calculate_rsi(closes: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    require("rsi", period, period + 1, closes.len())?;

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            let (gain, loss) = split_delta(d);
            (g + gain, l + loss)
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss)?);

    for &delta in &deltas[period..] {
        let (gain, loss) = split_delta(delta);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        result.push(rsi_from_averages(avg_gain, avg_loss)?);
    }

    Ok(result)
}

/// Most recent RSI value together with its zone.
pub fn current_rsi(closes: &[f64], period: usize) -> IndicatorResult<(f64, RsiZone)> {
    let series = calculate_rsi(closes, period)?;
    let value = *series.last().ok_or(Unavailable::InsufficientHistory {
        indicator: "rsi",
        required: period + 1,
        available: closes.len(),
    })?;
    Ok((value, RsiZone::of(value)))
}

// =============================================================================
// Internal helpers
// =============================================================================

fn split_delta(delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (delta, 0.0)
    } else if delta < 0.0 {
        (0.0, -delta)
    } else {
        (0.0, 0.0)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> IndicatorResult<f64> {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Ok(rsi)
    } else {
        Err(Unavailable::NonFinite { indicator: "rsi" })
    }
}
