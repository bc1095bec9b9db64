// =============================================================================
// Market Overview — index level and bellwether quotes
// =============================================================================
//
// Printed ahead of symbol reports so each reading can be set against the
// session as a whole.  Every line is a plain quote request; a line whose
// quote fails is left out and named in `unavailable`.
// =============================================================================

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::market_data::{MarketDataSource, Quote};

/// The capitalisation-weighted TAIEX.
pub const INDEX_SYMBOL: &str = "TAIEX";

/// Large caps across semiconductors, financials, cement and steel.
pub const BELLWETHERS: [&str; 6] = ["2330", "2454", "2886", "2887", "1101", "2002"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewLine {
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub change: f64,
    pub change_percent: f64,
}

impl OverviewLine {
    fn from_quote(symbol: &str, quote: &Quote) -> Self {
        let price = [quote.close_price, quote.last_price]
            .into_iter()
            .find(|p| p.is_finite() && *p > 0.0);
        Self {
            symbol: symbol.to_string(),
            name: quote.name.clone(),
            price,
            change: quote.change,
            change_percent: quote.change_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOverview {
    pub index: Option<OverviewLine>,
    /// In [`BELLWETHERS`] order.
    pub bellwethers: Vec<OverviewLine>,
    /// Symbols whose quote could not be fetched.
    pub unavailable: Vec<String>,
}

impl MarketOverview {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.bellwethers.is_empty()
    }
}

/// Fetch the index and every bellwether concurrently.
pub async fn market_overview<S: MarketDataSource>(source: &S) -> MarketOverview {
    let symbols: Vec<&str> = std::iter::once(INDEX_SYMBOL).chain(BELLWETHERS).collect();
    let quotes = join_all(symbols.iter().map(|s| source.quote(s))).await;

    let mut overview = MarketOverview {
        index: None,
        bellwethers: Vec::with_capacity(BELLWETHERS.len()),
        unavailable: Vec::new(),
    };
    for (symbol, result) in symbols.into_iter().zip(quotes) {
        match result {
            Ok(quote) => {
                let line = OverviewLine::from_quote(symbol, &quote);
                if symbol == INDEX_SYMBOL {
                    overview.index = Some(line);
                } else {
                    overview.bellwethers.push(line);
                }
            }
            Err(e) => {
                warn!(symbol, error = %format!("{e:#}"), "overview quote unavailable");
                overview.unavailable.push(symbol.to_string());
            }
        }
    }

    info!(
        lines = overview.bellwethers.len() + usize::from(overview.index.is_some()),
        missing = overview.unavailable.len(),
        "market overview fetched"
    );
    overview
}
