// =============================================================================
// Volume-Weighted Average Price (VWAP)
// =============================================================================
//
//   VWAP = Σ(typical_i * volume_i) / Σ(volume_i),  typical = (H + L + C) / 3
//
// Bars with zero volume take no part in either sum.

use crate::market_data::Candle;

use super::{IndicatorResult, Unavailable};

/// VWAP over every supplied candle.
pub fn calculate_vwap(candles: &[Candle]) -> IndicatorResult<f64> {
    let (total_pv, total_volume) = candles
        .iter()
        .filter(|c| c.volume > 0)
        .fold((0.0_f64, 0u64), |(pv, vol), c| {
            (pv + c.typical_price() * c.volume as f64, vol + c.volume)
        });

    if total_volume == 0 {
        return Err(Unavailable::NoVolume);
    }

    let vwap = total_pv / total_volume as f64;
    if vwap.is_finite() {
        Ok(vwap)
    } else {
        Err(Unavailable::NonFinite { indicator: "vwap" })
    }
}
