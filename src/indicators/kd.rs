// =============================================================================
// Stochastic KD (Taiwan-style smoothing)
// =============================================================================
//
//   RSV_i = (C_i - min(L window)) / (max(H window) - min(L window)) * 100
//           (50 when the window's high equals its low)
//   K_i   = (1 - 1/d) * K_{i-1} + (1/d) * RSV_i      K_{-1} = 50
//   D_i   = (1 - 1/d) * D_{i-1} + (1/d) * K_i        D_{-1} = 50
//
// With the default d = 3 this is the familiar 2/3 - 1/3 recursion.
// =============================================================================

use serde::Serialize;

use super::{require, tail, IndicatorResult, Unavailable};

pub const DEFAULT_K_PERIOD: usize = 9;
pub const DEFAULT_D_PERIOD: usize = 3;

const SEED: f64 = 50.0;
const HISTORY_LEN: usize = 5;

/// K/D crossing on the final step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KdCross {
    Golden,
    Death,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KdResult {
    pub k: f64,
    pub d: f64,
    pub k_history: Vec<f64>,
    pub d_history: Vec<f64>,
    pub cross: KdCross,
}

/// RSV for each trailing window of `k_period` bars.
pub fn rsv_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
) -> IndicatorResult<Vec<f64>> {
    if highs.len() != lows.len() || lows.len() != closes.len() {
        return Err(Unavailable::MismatchedSeries { indicator: "kd" });
    }
    require("kd", k_period, k_period, closes.len())?;

    let mut rsv = Vec::with_capacity(closes.len() - k_period + 1);
    for i in (k_period - 1)..closes.len() {
        let start = i + 1 - k_period;
        let high = highs[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = lows[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
        let value = if high == low {
            50.0
        } else {
            (closes[i] - low) / (high - low) * 100.0
        };
        if !value.is_finite() {
            return Err(Unavailable::NonFinite { indicator: "kd" });
        }
        rsv.push(value);
    }
    Ok(rsv)
}

/// Compute K and D from high/low/close series of equal length.
pub fn calculate_kd(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> IndicatorResult<KdResult> {
    if d_period == 0 {
        return Err(Unavailable::InvalidPeriod { indicator: "kd" });
    }
    let rsv = rsv_series(highs, lows, closes, k_period)?;

    let alpha = 1.0 / d_period as f64;
    let mut k_values = Vec::with_capacity(rsv.len());
    let mut d_values = Vec::with_capacity(rsv.len());
    let mut k = SEED;
    let mut d = SEED;
    for value in rsv {
        k = (1.0 - alpha) * k + alpha * value;
        d = (1.0 - alpha) * d + alpha * k;
        k_values.push(k);
        d_values.push(d);
    }

    let cross = match (&k_values[..], &d_values[..]) {
        ([.., k_prev, _], [.., d_prev, _]) if k_prev <= d_prev && k > d => KdCross::Golden,
        ([.., k_prev, _], [.., d_prev, _]) if k_prev >= d_prev && k < d => KdCross::Death,
        _ => KdCross::None,
    };

    Ok(KdResult {
        k,
        d,
        k_history: tail(&k_values, HISTORY_LEN),
        d_history: tail(&d_values, HISTORY_LEN),
        cross,
    })
}
