// =============================================================================
// Intraday Profile — stage-two gate and bonus tags for a screened symbol
// =============================================================================
//
//   range %          = (high − low) / reference × 100        (required gate)
//   volume ratio     = last 5-minute bar volume / previous bar volume
//   open momentum %  = |price − open| / open × 100
//   avg deviation %  = |price − avg price| / avg price × 100
//
// The range gate decides whether a symbol is analysed at all; the other
// readings only add tags.

use serde::{Deserialize, Serialize};

use crate::market_data::{Candle, Quote};

/// Open more than this fraction away from the previous close is a gap.
const GAP_FACTOR: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileThresholds {
    pub min_range_pct: f64,
    pub volume_ratio: f64,
    pub momentum_pct: f64,
    pub avg_price_deviation_pct: f64,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            min_range_pct: 2.0,
            volume_ratio: 2.0,
            momentum_pct: 1.5,
            avg_price_deviation_pct: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonusTag {
    VolumeSurge,
    OpenMomentum,
    AvgPriceDeviation,
}

impl std::fmt::Display for BonusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VolumeSurge => write!(f, "volume surge"),
            Self::OpenMomentum => write!(f, "open momentum"),
            Self::AvgPriceDeviation => write!(f, "avg-price deviation"),
        }
    }
}

/// Opening gap relative to the previous close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenGap {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayProfile {
    pub range_pct: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub momentum_pct: Option<f64>,
    pub avg_price_deviation_pct: Option<f64>,
    pub gap: Option<OpenGap>,
    pub tags: Vec<BonusTag>,
}

impl IntradayProfile {
    /// Whether the intraday range clears `min_range_pct`.  A symbol without a
    /// reference price never passes.
    pub fn passes_range(&self, min_range_pct: f64) -> bool {
        self.range_pct.is_some_and(|r| r >= min_range_pct)
    }
}

fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

/// Volume of the last bar over the bar before it.
pub fn volume_ratio(bars: &[Candle]) -> Option<f64> {
    let [.., prev, last] = bars else {
        return None;
    };
    if prev.volume == 0 {
        return None;
    }
    Some(last.volume as f64 / prev.volume as f64)
}

/// Profile a symbol from its quote and today's 5-minute candles.
pub fn intraday_profile(quote: &Quote, bars_5m: &[Candle], t: &ProfileThresholds) -> IntradayProfile {
    let price = quote.current_price();

    let range_pct = quote.reference().and_then(|reference| {
        let (high, low) = (positive(quote.high_price)?, positive(quote.low_price)?);
        Some((high - low) / reference * 100.0)
    });

    let momentum_pct = match (price, positive(quote.open_price)) {
        (Some(p), Some(open)) => Some(((p - open) / open * 100.0).abs()),
        _ => None,
    };

    let avg_price_deviation_pct = match (price, positive(quote.avg_price)) {
        (Some(p), Some(avg)) => Some(((p - avg) / avg * 100.0).abs()),
        _ => None,
    };

    let gap = match (positive(quote.open_price), positive(quote.previous_close)) {
        (Some(open), Some(prev)) if open > prev * (1.0 + GAP_FACTOR) => Some(OpenGap::Up),
        (Some(open), Some(prev)) if open < prev * (1.0 - GAP_FACTOR) => Some(OpenGap::Down),
        _ => None,
    };

    let volume_ratio = volume_ratio(bars_5m);

    let mut tags = Vec::new();
    if volume_ratio.is_some_and(|v| v >= t.volume_ratio) {
        tags.push(BonusTag::VolumeSurge);
    }
    if momentum_pct.is_some_and(|m| m >= t.momentum_pct) {
        tags.push(BonusTag::OpenMomentum);
    }
    if avg_price_deviation_pct.is_some_and(|d| d >= t.avg_price_deviation_pct) {
        tags.push(BonusTag::AvgPriceDeviation);
    }

    IntradayProfile {
        range_pct,
        volume_ratio,
        momentum_pct,
        avg_price_deviation_pct,
        gap,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(volume: u64) -> Candle {
        Candle::new(0, 10.0, 10.0, 10.0, 10.0, volume)
    }

    fn active_quote() -> Quote {
        Quote {
            symbol: "2603".into(),
            open_price: 100.0,
            high_price: 104.0,
            low_price: 99.0,
            last_price: 103.0,
            avg_price: 101.5,
            reference_price: 98.0,
            previous_close: 98.0,
            ..Default::default()
        }
    }

    #[test]
    fn volume_ratio_uses_last_two_bars() {
        assert_eq!(volume_ratio(&[bar(10), bar(30), bar(90)]), Some(3.0));
        assert_eq!(volume_ratio(&[bar(10)]), None);
        assert_eq!(volume_ratio(&[bar(0), bar(10)]), None);
    }

    #[test]
    fn active_symbol_collects_all_tags() {
        let p = intraday_profile(&active_quote(), &[bar(100), bar(250)], &ProfileThresholds::default());
        let range = p.range_pct.unwrap();
        assert!((range - 5.0 / 98.0 * 100.0).abs() < 1e-9);
        assert!(p.passes_range(2.0));
        assert_eq!(
            p.tags,
            vec![BonusTag::VolumeSurge, BonusTag::OpenMomentum, BonusTag::AvgPriceDeviation]
        );
        assert_eq!(p.gap, Some(OpenGap::Up));
    }

    #[test]
    fn quiet_symbol_fails_range_gate() {
        let q = Quote {
            open_price: 50.0,
            high_price: 50.3,
            low_price: 49.9,
            last_price: 50.1,
            avg_price: 50.05,
            reference_price: 50.0,
            ..Default::default()
        };
        let p = intraday_profile(&q, &[], &ProfileThresholds::default());
        assert!(!p.passes_range(2.0));
        assert!(p.tags.is_empty());
        assert_eq!(p.volume_ratio, None);
        assert_eq!(p.gap, None);
    }

    #[test]
    fn no_reference_price_never_passes() {
        let q = Quote {
            high_price: 60.0,
            low_price: 40.0,
            ..Default::default()
        };
        let p = intraday_profile(&q, &[], &ProfileThresholds::default());
        assert_eq!(p.range_pct, None);
        assert!(!p.passes_range(0.0));
    }
}
