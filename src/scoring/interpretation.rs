// =============================================================================
// Interpretation — qualitative labels for the indicator readings
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::kd::KdResult;
use crate::indicators::macd::MacdResult;

/// MA5 deviation above which a breakout through a bearish stack is "strong".
const BREAKOUT_DEVIATION_PCT: f64 = 15.0;
/// |MA5 deviation| above which a pullback in a bullish stack is "deep".
const PULLBACK_DEVIATION_PCT: f64 = 10.0;

// ---------------------------------------------------------------------------
// Moving-average arrangement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaStack {
    /// MA5 > MA10 > MA20
    Bullish,
    /// MA5 < MA10 < MA20
    Bearish,
    Tangled,
}

impl std::fmt::Display for MaStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Tangled => write!(f, "tangled"),
        }
    }
}

/// Price position relative to the stack, with the contradiction cases
/// (price above a bearish stack, below a bullish one) split out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaPricePosition {
    AboveAll,
    BelowAll,
    Between,
    StrongBreakout,
    TemporaryBreakout,
    DeepPullback,
    TemporaryPullback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaArrangement {
    pub stack: MaStack,
    pub position: MaPricePosition,
    /// (price − MA5) / MA5 × 100; 0 when MA5 is not positive.
    pub ma5_deviation_pct: f64,
}

impl std::fmt::Display for MaArrangement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail = match self.position {
            MaPricePosition::AboveAll => "price above all MAs",
            MaPricePosition::BelowAll => "price below all MAs",
            MaPricePosition::Between => "price weaving between MAs",
            MaPricePosition::StrongBreakout => "but price has broken out strongly",
            MaPricePosition::TemporaryBreakout => "price temporarily above",
            MaPricePosition::DeepPullback => "but price is in a deep pullback",
            MaPricePosition::TemporaryPullback => "price temporarily pulling back",
        };
        write!(f, "{} stack, {}", self.stack, tail)
    }
}

pub fn ma_arrangement(ma5: f64, ma10: f64, ma20: f64, price: f64) -> MaArrangement {
    let stack = if ma5 > ma10 && ma10 > ma20 {
        MaStack::Bullish
    } else if ma5 < ma10 && ma10 < ma20 {
        MaStack::Bearish
    } else {
        MaStack::Tangled
    };

    let above_all = price > ma5 && price > ma10 && price > ma20;
    let below_all = price < ma5 && price < ma10 && price < ma20;
    let ma5_deviation_pct = if ma5 > 0.0 { (price - ma5) / ma5 * 100.0 } else { 0.0 };

    let position = match stack {
        MaStack::Bearish if above_all => {
            if ma5_deviation_pct > BREAKOUT_DEVIATION_PCT {
                MaPricePosition::StrongBreakout
            } else {
                MaPricePosition::TemporaryBreakout
            }
        }
        MaStack::Bullish if below_all => {
            if ma5_deviation_pct.abs() > PULLBACK_DEVIATION_PCT {
                MaPricePosition::DeepPullback
            } else {
                MaPricePosition::TemporaryPullback
            }
        }
        _ if above_all => MaPricePosition::AboveAll,
        _ if below_all => MaPricePosition::BelowAll,
        _ => MaPricePosition::Between,
    };

    MaArrangement {
        stack,
        position,
        ma5_deviation_pct,
    }
}

// ---------------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacdSignal {
    Bullish,
    LeaningBullish,
    Bearish,
}

impl std::fmt::Display for MacdSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::LeaningBullish => write!(f, "leaning bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub signal: MacdSignal,
    /// e.g. "DIF above MACD | above zero | momentum +"
    pub detail: String,
}

pub fn macd_signal(m: &MacdResult) -> MacdReading {
    let cross = if m.dif > m.macd { "DIF above MACD" } else { "DIF below MACD" };
    let zero = if m.dif > 0.0 && m.macd > 0.0 {
        "above zero"
    } else if m.dif < 0.0 && m.macd < 0.0 {
        "below zero"
    } else {
        "straddling zero"
    };
    let momentum = if m.osc > 0.0 { "momentum +" } else { "momentum -" };

    let signal = match m.bullish_conditions() {
        0 => MacdSignal::Bearish,
        1 => MacdSignal::LeaningBullish,
        _ => MacdSignal::Bullish,
    };

    MacdReading {
        signal,
        detail: format!("{cross} | {zero} | {momentum}"),
    }
}

// ---------------------------------------------------------------------------
// Oscillator zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdZone {
    Overbought,
    Oversold,
    Normal,
}

impl std::fmt::Display for KdZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "overbought"),
            Self::Oversold => write!(f, "oversold"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

pub fn kd_zone(kd: &KdResult) -> KdZone {
    if kd.k > 80.0 {
        KdZone::Overbought
    } else if kd.k < 20.0 {
        KdZone::Oversold
    } else {
        KdZone::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandZone {
    NearUpper,
    NearLower,
    Middle,
}

impl std::fmt::Display for BandZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NearUpper => write!(f, "near upper band"),
            Self::NearLower => write!(f, "near lower band"),
            Self::Middle => write!(f, "mid channel"),
        }
    }
}

/// Zone of a band position in [0, 1].
pub fn band_zone(position: f64) -> BandZone {
    if position > 0.8 {
        BandZone::NearUpper
    } else if position < 0.2 {
        BandZone::NearLower
    } else {
        BandZone::Middle
    }
}
