// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators behind the strength
// score.  Every public function returns `IndicatorResult<T>` so callers are
// forced to handle insufficient-data and numerical-edge-case scenarios, and the
// cause travels with the miss instead of being flattened into a zero.

pub mod bollinger;
pub mod ema;
pub mod kd;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod vwap;

pub use snapshot::IndicatorSnapshot;

use serde::Serialize;
use thiserror::Error;

/// Why an indicator (or any derived reading) is not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum Unavailable {
    #[error("{indicator}: need {required} points, have {available}")]
    InsufficientHistory {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("{indicator}: period must be positive")]
    InvalidPeriod { indicator: &'static str },

    #[error("{indicator}: non-finite intermediate value")]
    NonFinite { indicator: &'static str },

    #[error("{indicator}: input series have different lengths")]
    MismatchedSeries { indicator: &'static str },

    #[error("vwap: total volume is zero")]
    NoVolume,

    #[error("order book: both sides empty")]
    EmptyBook,

    #[error("order book: total weighted strength is zero")]
    ZeroStrength,

    #[error("block flow: no print at or above {threshold} lots")]
    NoBlockTrades { threshold: u64 },

    #[error("no usable current price")]
    MissingPrice,

    #[error("upstream data missing: {0}")]
    NoData(String),
}

/// Result type shared by every indicator and microstructure computation.
pub type IndicatorResult<T> = Result<T, Unavailable>;

/// Common guard: reject a zero period and a series shorter than `required`.
pub(crate) fn require(
    indicator: &'static str,
    period: usize,
    required: usize,
    available: usize,
) -> IndicatorResult<()> {
    if period == 0 {
        return Err(Unavailable::InvalidPeriod { indicator });
    }
    if available < required {
        return Err(Unavailable::InsufficientHistory {
            indicator,
            required,
            available,
        });
    }
    Ok(())
}

/// Last `n` elements of a series (all of it when shorter).
pub(crate) fn tail(series: &[f64], n: usize) -> Vec<f64> {
    series[series.len().saturating_sub(n)..].to_vec()
}
