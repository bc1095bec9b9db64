// =============================================================================
// Screening Universe — market snapshot pre-filter
// =============================================================================
//
// Stage one of the screener.  Starting from the whole-market snapshot a row
// is dropped, in this order, when:
//
//   1. its code is on the exclusion list,
//   2. its name marks it as a fund or derivative (ETF, ETN, 債, 期),
//   3. it has not traded today (suspended),
//   4. its volume is below the configured minimum.
//
// Survivors are sorted by volume, largest first.
//
// When the snapshot cannot be fetched the universe is seeded from the plain
// ticker list instead.  That list carries no volume, so only rules 1 and 2
// apply and the first `fallback_limit` survivors are kept in feed order.
// =============================================================================

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::market_data::SnapshotRow;

/// Name fragments that mark a listing as something other than common stock.
pub const EXCLUDED_NAME_KEYWORDS: [&str; 4] = ["ETF", "ETN", "債", "期"];

/// Parse an exclusion list: one code per line, blank lines and `#` comments
/// ignored.
pub fn parse_exclusion_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the exclusion list from `path`.  A missing or unreadable file yields
/// an empty set and a warning.
pub fn load_exclusion_list(path: impl AsRef<Path>) -> HashSet<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let codes = parse_exclusion_list(&content);
            info!(path = %path.display(), count = codes.len(), "exclusion list loaded");
            codes
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "exclusion list not loaded — nothing excluded by code");
            HashSet::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseFilter {
    /// Minimum day volume, in lots.
    pub min_volume: u64,
    /// Keep at most this many candidates after sorting.
    pub max_candidates: Option<usize>,
    /// Exchange whose ticker list replaces an unavailable snapshot.
    pub fallback_exchange: String,
    /// Candidates kept from the ticker list.
    pub fallback_limit: usize,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            min_volume: 2_000,
            max_candidates: None,
            fallback_exchange: "TWSE".to_string(),
            fallback_limit: 100,
        }
    }
}

/// Where the candidate list came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseOrigin {
    #[default]
    Snapshot,
    /// Ticker list used because the snapshot failed; no volume filter.
    TickerList,
}

/// How many snapshot rows each rule removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionCounts {
    pub listed: usize,
    pub keyword: usize,
    pub suspended: usize,
    pub low_volume: usize,
    /// Rows dropped for lacking a symbol or name.
    pub malformed: usize,
    /// Rows cut by `max_candidates`.
    pub capped: usize,
}

impl ExclusionCounts {
    pub fn total(&self) -> usize {
        self.listed + self.keyword + self.suspended + self.low_volume + self.malformed + self.capped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Universe {
    pub origin: UniverseOrigin,
    /// Rows in the raw snapshot (or ticker list).
    pub snapshot_size: usize,
    pub candidates: Vec<SnapshotRow>,
    pub excluded: ExclusionCounts,
}

pub fn build_universe(
    rows: Vec<SnapshotRow>,
    exclusion_list: &HashSet<String>,
    filter: &UniverseFilter,
) -> Universe {
    let snapshot_size = rows.len();
    let mut excluded = ExclusionCounts::default();
    let mut candidates = Vec::with_capacity(rows.len());

    for row in rows {
        if row.symbol.is_empty() || row.name.is_empty() {
            excluded.malformed += 1;
        } else if exclusion_list.contains(&row.symbol) {
            excluded.listed += 1;
        } else if EXCLUDED_NAME_KEYWORDS.iter().any(|k| row.name.contains(k)) {
            excluded.keyword += 1;
        } else if row.trade_volume == 0 {
            excluded.suspended += 1;
        } else if row.trade_volume < filter.min_volume {
            excluded.low_volume += 1;
        } else {
            candidates.push(row);
        }
    }

    candidates.sort_by(|a, b| {
        b.trade_volume
            .cmp(&a.trade_volume)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    if let Some(cap) = filter.max_candidates {
        if candidates.len() > cap {
            excluded.capped = candidates.len() - cap;
            candidates.truncate(cap);
        }
    }

    info!(
        snapshot = snapshot_size,
        candidates = candidates.len(),
        listed = excluded.listed,
        keyword = excluded.keyword,
        suspended = excluded.suspended,
        low_volume = excluded.low_volume,
        "screening universe built"
    );

    Universe {
        origin: UniverseOrigin::Snapshot,
        snapshot_size,
        candidates,
        excluded,
    }
}

/// Universe from the ticker list: exclusion list and name keywords only, the
/// first `filter.fallback_limit` survivors in feed order.
pub fn build_fallback_universe(
    rows: Vec<SnapshotRow>,
    exclusion_list: &HashSet<String>,
    filter: &UniverseFilter,
) -> Universe {
    let snapshot_size = rows.len();
    let mut excluded = ExclusionCounts::default();
    let mut candidates = Vec::new();

    for row in rows {
        if row.symbol.is_empty() || row.name.is_empty() {
            excluded.malformed += 1;
        } else if exclusion_list.contains(&row.symbol) {
            excluded.listed += 1;
        } else if EXCLUDED_NAME_KEYWORDS.iter().any(|k| row.name.contains(k)) {
            excluded.keyword += 1;
        } else if candidates.len() >= filter.fallback_limit {
            excluded.capped += 1;
        } else {
            candidates.push(row);
        }
    }

    warn!(
        tickers = snapshot_size,
        candidates = candidates.len(),
        "screening universe built from ticker list — no volume filter"
    );

    Universe {
        origin: UniverseOrigin::TickerList,
        snapshot_size,
        candidates,
        excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, name: &str, volume: u64) -> SnapshotRow {
        SnapshotRow {
            symbol: symbol.into(),
            name: name.into(),
            close_price: 50.0,
            change_percent: 0.0,
            trade_volume: volume,
        }
    }

    #[test]
    fn exclusion_list_skips_comments_and_blanks() {
        let codes = parse_exclusion_list("# funds\n0050\n\n  0056  \n# end\n");
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("0056"));
    }

    #[test]
    fn missing_exclusion_file_is_empty() {
        let codes = load_exclusion_list("/definitely/not/here/etf.list");
        assert!(codes.is_empty());
    }

    #[test]
    fn exclusion_file_is_read() {
        let path = std::env::temp_dir().join(format!("etf-{}.list", uuid::Uuid::new_v4()));
        std::fs::write(&path, "0050\n# comment\n006208\n").unwrap();
        let codes = load_exclusion_list(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn filters_apply_in_order_and_sort_by_volume() {
        let rows = vec![
            row("0050", "元大台灣50", 90_000),
            row("00632R", "元大台灣50反1 ETF", 50_000),
            row("2330", "台積電", 30_000),
            row("1101", "台泥", 0),
            row("2303", "聯電", 1_500),
            row("2317", "鴻海", 45_000),
            row("", "no code", 10_000),
        ];
        let excluded: HashSet<String> = ["0050".to_string()].into_iter().collect();
        let u = build_universe(rows, &excluded, &UniverseFilter::default());

        let symbols: Vec<&str> = u.candidates.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["2317", "2330"]);
        assert_eq!(u.snapshot_size, 7);
        assert_eq!(u.excluded.listed, 1);
        assert_eq!(u.excluded.keyword, 1);
        assert_eq!(u.excluded.suspended, 1);
        assert_eq!(u.excluded.low_volume, 1);
        assert_eq!(u.excluded.malformed, 1);
        assert_eq!(u.excluded.total() + u.candidates.len(), u.snapshot_size);
    }

    #[test]
    fn max_candidates_caps_after_sorting() {
        let rows = vec![row("A", "a", 3_000), row("B", "b", 9_000), row("C", "c", 5_000)];
        let filter = UniverseFilter {
            max_candidates: Some(2),
            ..Default::default()
        };
        let u = build_universe(rows, &HashSet::new(), &filter);
        let symbols: Vec<&str> = u.candidates.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B", "C"]);
        assert_eq!(u.excluded.capped, 1);
    }

    #[test]
    fn fallback_keeps_feed_order_without_volume_filter() {
        let mut rows = vec![row("0050", "元大台灣50", 0), row("00679B", "元大美債20年", 0)];
        rows.extend((0..120).map(|i| row(&format!("{}", 1100 + i), "common", 0)));
        let excluded: HashSet<String> = ["0050".to_string()].into_iter().collect();

        let u = build_fallback_universe(rows, &excluded, &UniverseFilter::default());
        assert_eq!(u.origin, UniverseOrigin::TickerList);
        assert_eq!(u.candidates.len(), 100);
        assert_eq!(u.candidates[0].symbol, "1100");
        assert_eq!(u.candidates[99].symbol, "1199");
        assert_eq!(u.excluded.listed, 1);
        assert_eq!(u.excluded.keyword, 1);
        assert_eq!(u.excluded.low_volume + u.excluded.suspended, 0);
        assert_eq!(u.excluded.capped, 20);
        assert_eq!(u.excluded.total() + u.candidates.len(), u.snapshot_size);
    }
}
