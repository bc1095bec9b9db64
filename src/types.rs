// =============================================================================
// Shared types used across the strength scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Qualitative bucket derived from the composite strength percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthBucket {
    Strong,
    NeutralBullish,
    NeutralBearish,
    Weak,
}

impl std::fmt::Display for StrengthBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "strong"),
            Self::NeutralBullish => write!(f, "neutral-bullish"),
            Self::NeutralBearish => write!(f, "neutral-bearish"),
            Self::Weak => write!(f, "weak"),
        }
    }
}

/// Which side of the book dominates the weighted resting interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookSentiment {
    StrongBuy,
    LeaningBuy,
    Balanced,
    LeaningSell,
    StrongSell,
}

impl std::fmt::Display for BookSentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "strong buy"),
            Self::LeaningBuy => write!(f, "leaning buy"),
            Self::Balanced => write!(f, "balanced"),
            Self::LeaningSell => write!(f, "leaning sell"),
            Self::StrongSell => write!(f, "strong sell"),
        }
    }
}

/// Net direction of block-trade volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowBias {
    NetBuy,
    NetSell,
    Balanced,
}

impl std::fmt::Display for FlowBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetBuy => write!(f, "net buy"),
            Self::NetSell => write!(f, "net sell"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}

/// Aggressor side of a single print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}
