// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), σ being the population standard deviation of
// the trailing window.  The position of a price inside the bands is
//   clamp((price - lower) / (upper - lower), 0, 1)
// with 0.5 for a collapsed (flat) band.

use serde::Serialize;

use super::{require, IndicatorResult, Unavailable};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_NUM_STD: f64 = 2.0;

/// Result of a Bollinger Band calculation at the last window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Position of the last close in [0, 1].
    pub position: f64,
    /// upper - lower, in price units.
    pub width: f64,
    /// width / middle; 0 when middle is not positive.
    pub squeeze: f64,
}

impl BollingerResult {
    /// Normalised position of `price` within the bands.
    pub fn position_of(&self, price: f64) -> f64 {
        band_position(price, self.upper, self.lower)
    }
}

/// One (upper, middle, lower) triple per trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Rolling bands for every window of `period` closes.
pub fn bollinger_series(closes: &[f64], period: usize, num_std: f64) -> IndicatorResult<Vec<Band>> {
    require("bollinger", period, period, closes.len())?;

    let period_f = period as f64;
    let bands: Vec<Band> = closes
        .windows(period)
        .map(|window| {
            let middle = window.iter().sum::<f64>() / period_f;
            let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period_f;
            let std_dev = variance.sqrt();
            Band {
                upper: middle + num_std * std_dev,
                middle,
                lower: middle - num_std * std_dev,
            }
        })
        .collect();

    if bands
        .iter()
        .any(|b| !(b.upper.is_finite() && b.middle.is_finite() && b.lower.is_finite()))
    {
        return Err(Unavailable::NonFinite { indicator: "bollinger" });
    }
    Ok(bands)
}

/// Calculate Bollinger Bands at the last window and place the last close in them.
pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> IndicatorResult<BollingerResult> {
    let bands = bollinger_series(closes, period, num_std)?;
    let (Some(band), Some(&price)) = (bands.last(), closes.last()) else {
        return Err(Unavailable::InsufficientHistory {
            indicator: "bollinger",
            required: period,
            available: closes.len(),
        });
    };

    let width = band.upper - band.lower;
    let squeeze = if band.middle > 0.0 { width / band.middle } else { 0.0 };

    Ok(BollingerResult {
        upper: band.upper,
        middle: band.middle,
        lower: band.lower,
        position: band_position(price, band.upper, band.lower),
        width,
        squeeze,
    })
}

fn band_position(price: f64, upper: f64, lower: f64) -> f64 {
    if upper == lower {
        return 0.5;
    }
    let raw = (price - lower) / (upper - lower);
    if raw.is_nan() {
        0.5
    } else {
        raw.clamp(0.0, 1.0)
    }
}
