// =============================================================================
// Composite Scorer — rule-based technical strength, 0–100 %
// =============================================================================
//
// | Rule                | Points when ...                                | Max |
// |---------------------|------------------------------------------------|-----|
// | price_vs_ma5        | price > MA5                                    |  1  |
// | price_vs_ma10       | price > MA10                                   |  1  |
// | ma_order            | MA5 > MA10                                     |  1  |
// | rsi                 | +1 if 30 < RSI < 70, +1 if RSI > 50            |  2  |
// | macd                | 2 if ≥2 bullish conditions, 1 if exactly one   |  2  |
// | kd                  | +1 if K > D, +1 if 20 < K < 80                 |  2  |
// | vwap                | price > VWAP                                   |  1  |
// | order_book          | bid ratio > 55 %                               |  1  |
//
// A rule enters both numerator and denominator only when every input it
// reads is available.  Missing inputs are listed in `skipped` with the cause.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::macd::MacdResult;
use crate::indicators::{IndicatorResult, IndicatorSnapshot, Unavailable};
use crate::microstructure::BookPressure;
use crate::types::StrengthBucket;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

fn default_strong() -> f64 {
    70.0
}
fn default_neutral_bullish() -> f64 {
    50.0
}
fn default_neutral_bearish() -> f64 {
    30.0
}
fn default_book_bid_ratio() -> f64 {
    55.0
}

/// Bucket boundaries (inclusive lower bounds, in percent) and the bid-ratio
/// level the order-book rule requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    #[serde(default = "default_strong")]
    pub strong: f64,
    #[serde(default = "default_neutral_bullish")]
    pub neutral_bullish: f64,
    #[serde(default = "default_neutral_bearish")]
    pub neutral_bearish: f64,
    #[serde(default = "default_book_bid_ratio")]
    pub book_bid_ratio: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            strong: default_strong(),
            neutral_bullish: default_neutral_bullish(),
            neutral_bearish: default_neutral_bearish(),
            book_bid_ratio: default_book_bid_ratio(),
        }
    }
}

impl ScoreThresholds {
    pub fn bucket(&self, percentage: f64) -> StrengthBucket {
        if percentage >= self.strong {
            StrengthBucket::Strong
        } else if percentage >= self.neutral_bullish {
            StrengthBucket::NeutralBullish
        } else if percentage >= self.neutral_bearish {
            StrengthBucket::NeutralBearish
        } else {
            StrengthBucket::Weak
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Everything the rubric reads.  Each input is either a value or the reason
/// it is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInputs {
    pub price: IndicatorResult<f64>,
    pub ma5: IndicatorResult<f64>,
    pub ma10: IndicatorResult<f64>,
    pub rsi: IndicatorResult<f64>,
    pub macd: IndicatorResult<MacdResult>,
    /// (K, D)
    pub kd: IndicatorResult<(f64, f64)>,
    pub vwap: IndicatorResult<f64>,
    pub bid_ratio: IndicatorResult<f64>,
}

impl ScoreInputs {
    pub fn new(
        snapshot: &IndicatorSnapshot,
        price: Option<f64>,
        book: &IndicatorResult<BookPressure>,
    ) -> Self {
        Self {
            price: price
                .filter(|p| p.is_finite() && *p > 0.0)
                .ok_or(Unavailable::MissingPrice),
            ma5: snapshot.ma5.clone(),
            ma10: snapshot.ma10.clone(),
            rsi: snapshot.rsi.clone().map(|(value, _)| value),
            macd: snapshot.macd.clone(),
            kd: snapshot.kd.as_ref().map(|r| (r.k, r.d)).map_err(Clone::clone),
            vwap: snapshot.vwap.clone(),
            bid_ratio: book.as_ref().map(|p| p.bid_ratio).map_err(Clone::clone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub name: String,
    pub points: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub rules: Vec<RuleOutcome>,
    pub skipped: Vec<SkippedRule>,
    pub awarded: u32,
    pub possible: u32,
    /// awarded / possible × 100; absent when no rule could be evaluated.
    pub percentage: Option<f64>,
    pub bucket: Option<StrengthBucket>,
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

fn both(a: &IndicatorResult<f64>, b: &IndicatorResult<f64>) -> IndicatorResult<(f64, f64)> {
    Ok((a.clone()?, b.clone()?))
}

fn points(cond: bool) -> u32 {
    u32::from(cond)
}

#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    pub thresholds: ScoreThresholds,
}

impl CompositeScorer {
    pub fn new(thresholds: ScoreThresholds) -> Self {
        Self { thresholds }
    }

    pub fn score(&self, inputs: &ScoreInputs) -> ScoreBreakdown {
        let book_level = self.thresholds.book_bid_ratio;

        let rules: [(&str, u32, IndicatorResult<u32>); 8] = [
            (
                "price_vs_ma5",
                1,
                both(&inputs.price, &inputs.ma5).map(|(p, ma)| points(p > ma)),
            ),
            (
                "price_vs_ma10",
                1,
                both(&inputs.price, &inputs.ma10).map(|(p, ma)| points(p > ma)),
            ),
            (
                "ma_order",
                1,
                both(&inputs.ma5, &inputs.ma10).map(|(ma5, ma10)| points(ma5 > ma10)),
            ),
            (
                "rsi",
                2,
                inputs
                    .rsi
                    .clone()
                    .map(|rsi| points(rsi > 30.0 && rsi < 70.0) + points(rsi > 50.0)),
            ),
            (
                "macd",
                2,
                inputs.macd.as_ref().map_err(Clone::clone).map(|m| {
                    match m.bullish_conditions() {
                        0 => 0,
                        1 => 1,
                        _ => 2,
                    }
                }),
            ),
            (
                "kd",
                2,
                inputs
                    .kd
                    .clone()
                    .map(|(k, d)| points(k > d) + points(k > 20.0 && k < 80.0)),
            ),
            (
                "vwap",
                1,
                both(&inputs.price, &inputs.vwap).map(|(p, vwap)| points(p > vwap)),
            ),
            (
                "order_book",
                1,
                inputs.bid_ratio.clone().map(|bid| points(bid > book_level)),
            ),
        ];

        let mut breakdown = ScoreBreakdown {
            rules: Vec::with_capacity(rules.len()),
            skipped: Vec::new(),
            awarded: 0,
            possible: 0,
            percentage: None,
            bucket: None,
        };

        for (name, max, outcome) in rules {
            match outcome {
                Ok(pts) => {
                    breakdown.awarded += pts;
                    breakdown.possible += max;
                    breakdown.rules.push(RuleOutcome {
                        name: name.to_string(),
                        points: pts,
                        max,
                    });
                }
                Err(cause) => {
                    debug!(rule = name, reason = %cause, "rule skipped");
                    breakdown.skipped.push(SkippedRule {
                        name: name.to_string(),
                        reason: cause.to_string(),
                    });
                }
            }
        }

        if breakdown.possible > 0 {
            let pct = f64::from(breakdown.awarded) / f64::from(breakdown.possible) * 100.0;
            breakdown.percentage = Some(pct);
            breakdown.bucket = Some(self.thresholds.bucket(pct));
        }

        debug!(
            awarded = breakdown.awarded,
            possible = breakdown.possible,
            pct = ?breakdown.percentage,
            "composite score"
        );
        breakdown
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(i as i64 * 86_400_000, c - 0.5, c + 1.0, c - 1.0, c, 1_000)
            })
            .collect()
    }

    fn all_missing() -> ScoreInputs {
        let cause = Unavailable::NoData("test".into());
        ScoreInputs {
            price: Err(Unavailable::MissingPrice),
            ma5: Err(cause.clone()),
            ma10: Err(cause.clone()),
            rsi: Err(cause.clone()),
            macd: Err(cause.clone()),
            kd: Err(cause.clone()),
            vwap: Err(cause.clone()),
            bid_ratio: Err(cause),
        }
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        let t = ScoreThresholds::default();
        assert_eq!(t.bucket(70.0), StrengthBucket::Strong);
        assert_eq!(t.bucket(69.9), StrengthBucket::NeutralBullish);
        assert_eq!(t.bucket(50.0), StrengthBucket::NeutralBullish);
        assert_eq!(t.bucket(30.0), StrengthBucket::NeutralBearish);
        assert_eq!(t.bucket(29.9), StrengthBucket::Weak);
    }

    #[test]
    fn nothing_available_has_no_percentage() {
        let b = CompositeScorer::default().score(&all_missing());
        assert_eq!(b.possible, 0);
        assert_eq!(b.percentage, None);
        assert_eq!(b.bucket, None);
        assert_eq!(b.skipped.len(), 8);
    }

    #[test]
    fn price_rules_need_a_price() {
        let inputs = ScoreInputs {
            ma5: Ok(10.0),
            ma10: Ok(9.0),
            ..all_missing()
        };
        let b = CompositeScorer::default().score(&inputs);
        // Only the MA ordering rule can be evaluated.
        assert_eq!(b.possible, 1);
        assert_eq!(b.awarded, 1);
        assert_eq!(b.percentage, Some(100.0));
        assert!(b.skipped.iter().any(|s| s.name == "price_vs_ma5"));
    }

    #[test]
    fn rsi_and_kd_partial_points() {
        let inputs = ScoreInputs {
            rsi: Ok(75.0),
            kd: Ok((85.0, 80.0)),
            ..all_missing()
        };
        let b = CompositeScorer::default().score(&inputs);
        assert_eq!(b.possible, 4);
        assert_eq!(b.awarded, 2);
        assert_eq!(b.bucket, Some(StrengthBucket::NeutralBullish));
    }

    #[test]
    fn book_rule_uses_configured_threshold() {
        let inputs = ScoreInputs {
            bid_ratio: Ok(58.0),
            ..all_missing()
        };
        assert_eq!(CompositeScorer::default().score(&inputs).awarded, 1);
        let strict = CompositeScorer::new(ScoreThresholds {
            book_bid_ratio: 60.0,
            ..Default::default()
        });
        assert_eq!(strict.score(&inputs).awarded, 0);
    }

    #[test]
    fn ten_candles_count_only_defined_rules() {
        let candles = rising(10);
        let snap = IndicatorSnapshot::compute(&candles, &[]);
        let inputs = ScoreInputs::new(&snap, snap.last_close, &Err(Unavailable::EmptyBook));
        let b = CompositeScorer::default().score(&inputs);

        // MA5/MA10 rules (3) and KD (2) are defined; RSI(14) needs 15 closes,
        // MACD needs 34, VWAP has no intraday candles and the book is empty.
        assert_eq!(b.possible, 5);
        let skipped: Vec<&str> = b.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["rsi", "macd", "vwap", "order_book"]);
        assert!(b.percentage.is_some());
    }

    #[test]
    fn forty_rising_candles_score_strong() {
        let candles = rising(40);
        let snap = IndicatorSnapshot::compute(&candles, &candles);
        let price = snap.last_close;
        assert_eq!(price, Some(139.0));

        let ma5 = snap.ma5.clone().unwrap();
        let ma10 = snap.ma10.clone().unwrap();
        assert_eq!(ma5, 137.0);
        assert!(ma5 > ma10);

        let (rsi, _) = snap.rsi.clone().unwrap();
        assert!(rsi > 50.0);

        let macd = snap.macd.clone().unwrap();
        assert!(macd.dif > 0.0 && macd.macd > 0.0);

        let kd = snap.kd.clone().unwrap();
        assert!(kd.k > kd.d);
        assert!(kd.k > 80.0 && kd.d > 80.0);

        let vwap = snap.vwap.clone().unwrap();
        assert!(vwap < 139.0);

        let inputs = ScoreInputs::new(&snap, price, &Err(Unavailable::EmptyBook));
        let b = CompositeScorer::default().score(&inputs);
        assert_eq!(b.possible, 10);
        assert!(b.percentage.unwrap() >= 70.0);
        assert_eq!(b.bucket, Some(StrengthBucket::Strong));
    }

    fn rule_points(b: &ScoreBreakdown, name: &str) -> u32 {
        b.rules
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.points)
            .unwrap_or_else(|| panic!("rule {name} not evaluated"))
    }

    #[test]
    fn linear_series_with_tight_bars_scores_exactly_seventy() {
        // close = 100 + i, high/low half a point either side.
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(i as i64 * 86_400_000, c, c + 0.5, c - 0.5, c, 1_000)
            })
            .collect();
        let snap = IndicatorSnapshot::compute(&candles, &candles);
        assert_eq!(snap.ma5, Ok(137.0));

        // RSV settles at 8.5 / 9 of the window.
        let kd = snap.kd.clone().unwrap();
        assert!((kd.k - 94.44).abs() < 0.01);
        assert!((kd.d - 94.44).abs() < 0.01);

        // DIF and MACD coincide on a straight line.
        let macd = snap.macd.clone().unwrap();
        assert!((macd.dif - 7.0).abs() < 1e-9);
        assert!((macd.dif - macd.macd).abs() < 1e-9);

        let inputs = ScoreInputs::new(&snap, snap.last_close, &Err(Unavailable::EmptyBook));
        let b = CompositeScorer::default().score(&inputs);
        assert_eq!(rule_points(&b, "price_vs_ma5"), 1);
        assert_eq!(rule_points(&b, "price_vs_ma10"), 1);
        assert_eq!(rule_points(&b, "ma_order"), 1);
        assert_eq!(rule_points(&b, "rsi"), 1);
        assert_eq!(rule_points(&b, "macd"), 1);
        assert_eq!(rule_points(&b, "kd"), 1);
        assert_eq!(rule_points(&b, "vwap"), 1);
        assert_eq!((b.awarded, b.possible), (7, 10));
        assert_eq!(b.percentage, Some(70.0));
        assert_eq!(b.bucket, Some(StrengthBucket::Strong));
    }
}
