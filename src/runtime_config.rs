// =============================================================================
// Scanner Configuration — JSON settings with env overrides and atomic save
// =============================================================================
//
// Every tunable lives here.  All fields carry a serde default so that an old
// or partial `scanner_config.json` still loads; a missing file simply means
// "all defaults".  A handful of settings can be overridden from the
// environment (after `.env` is loaded):
//
//   FUGLE_API_KEY          API key for the market-data service
//   SCANNER_BASE_URL       REST endpoint root
//   SCANNER_MAX_WORKERS    concurrent screener pipelines (clamped to 1..=10)
//   SCANNER_EXCLUDE_LIST   path of the exclusion list
//
// Persistence uses an atomic tmp + rename so a crash never leaves a torn file.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::AnalysisParams;
use crate::market_data::fugle::DEFAULT_BASE_URL;
use crate::microstructure::{ClassificationPolicy, DEFAULT_BLOCK_THRESHOLD};
use crate::scoring::ScoreThresholds;
use crate::screener::intraday::ProfileThresholds;
use crate::screener::runner::MAX_WORKERS;
use crate::screener::universe::UniverseFilter;
use crate::screener::ScreenParams;

pub const DEFAULT_CONFIG_PATH: &str = "scanner_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_market() -> String {
    "TSE".to_string()
}

fn default_max_workers() -> usize {
    5
}

fn default_symbol_timeout_secs() -> u64 {
    8
}

fn default_session_timeout_secs() -> u64 {
    15
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_requests_per_minute() -> u32 {
    55
}

fn default_lookback_days() -> u32 {
    60
}

fn default_trade_limit() -> u32 {
    50
}

fn default_block_threshold() -> u64 {
    DEFAULT_BLOCK_THRESHOLD
}

fn default_min_volume() -> u64 {
    2_000
}

fn default_exclude_list() -> PathBuf {
    PathBuf::from("etf.list")
}

fn default_display_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_price_volume_levels() -> usize {
    5
}

fn default_fallback_exchange() -> String {
    "TWSE".to_string()
}

fn default_fallback_limit() -> usize {
    100
}

// =============================================================================
// ScannerConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    // --- Market-data service -------------------------------------------------

    /// API key.  Normally supplied through `FUGLE_API_KEY`; never written
    /// back to disk.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Request budget per rolling minute.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// How long to wait for the session to come up.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    // --- Analysis -------------------------------------------------------------

    /// Calendar days of daily candles fetched per symbol.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Recent prints fetched for block-trade analysis.
    #[serde(default = "default_trade_limit")]
    pub trade_limit: u32,

    /// Minimum print size, in lots, that counts as a block trade.
    #[serde(default = "default_block_threshold")]
    pub block_threshold: u64,

    #[serde(default)]
    pub classification: ClassificationPolicy,

    #[serde(default)]
    pub score_thresholds: ScoreThresholds,

    /// Rows of the price-volume table in symbol reports; 0 disables it.
    #[serde(default = "default_price_volume_levels")]
    pub price_volume_levels: usize,

    /// Print the index and bellwether quotes before symbol reports.
    #[serde(default = "default_true")]
    pub market_overview: bool,

    // --- Screener -------------------------------------------------------------

    /// Market whose snapshot seeds the screening universe.
    #[serde(default = "default_market")]
    pub market: String,

    /// Concurrent per-symbol pipelines (1..=10).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_symbol_timeout_secs")]
    pub symbol_timeout_secs: u64,

    /// Minimum day volume, in lots, for the screening universe.
    #[serde(default = "default_min_volume")]
    pub min_volume: u64,

    #[serde(default)]
    pub max_candidates: Option<usize>,

    #[serde(default)]
    pub profile: ProfileThresholds,

    #[serde(default = "default_exclude_list")]
    pub exclude_list: PathBuf,

    /// Exchange whose ticker list seeds the universe when the snapshot fails.
    #[serde(default = "default_fallback_exchange")]
    pub fallback_exchange: String,

    /// Candidates taken from that ticker list.
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,

    /// Rows shown in the text screen table.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            http_timeout_secs: default_http_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            session_timeout_secs: default_session_timeout_secs(),
            lookback_days: default_lookback_days(),
            trade_limit: default_trade_limit(),
            block_threshold: default_block_threshold(),
            classification: ClassificationPolicy::default(),
            score_thresholds: ScoreThresholds::default(),
            price_volume_levels: default_price_volume_levels(),
            market_overview: true,
            market: default_market(),
            max_workers: default_max_workers(),
            symbol_timeout_secs: default_symbol_timeout_secs(),
            min_volume: default_min_volume(),
            max_candidates: None,
            profile: ProfileThresholds::default(),
            exclude_list: default_exclude_list(),
            fallback_exchange: default_fallback_exchange(),
            fallback_limit: default_fallback_limit(),
            display_limit: default_display_limit(),
        }
    }
}

impl ScannerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            market = %config.market,
            max_workers = config.max_workers,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.  A file
    /// that exists but does not parse is reported and ignored.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no scanner config file — using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "scanner config unusable — using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise scanner config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "scanner config saved (atomic)");
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`.  Empty values are ignored and an
    /// unparsable worker count is reported and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("FUGLE_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = get("SCANNER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = get("SCANNER_MAX_WORKERS") {
            match raw.parse::<usize>() {
                Ok(n) => self.max_workers = n,
                Err(e) => warn!(value = %raw, error = %e, "ignoring SCANNER_MAX_WORKERS"),
            }
        }
        if let Some(path) = get("SCANNER_EXCLUDE_LIST") {
            self.exclude_list = PathBuf::from(path);
        }

        let clamped = self.max_workers.clamp(1, MAX_WORKERS);
        if clamped != self.max_workers {
            warn!(requested = self.max_workers, using = clamped, "max_workers out of range");
            self.max_workers = clamped;
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs.max(1))
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            lookback_days: self.lookback_days,
            trade_limit: self.trade_limit,
            block_threshold: self.block_threshold,
            price_volume_levels: self.price_volume_levels,
            classification: self.classification,
            thresholds: self.score_thresholds.clone(),
            ..AnalysisParams::default()
        }
    }

    /// Screen hits are ranked, not printed in full, so their analysis skips
    /// the price-volume table.
    pub fn screen_params(&self) -> ScreenParams {
        ScreenParams {
            max_workers: self.max_workers,
            symbol_timeout: Duration::from_secs(self.symbol_timeout_secs.max(1)),
            universe: UniverseFilter {
                min_volume: self.min_volume,
                max_candidates: self.max_candidates,
                fallback_exchange: self.fallback_exchange.clone(),
                fallback_limit: self.fallback_limit,
            },
            profile: self.profile.clone(),
            analysis: AnalysisParams {
                price_volume_levels: 0,
                ..self.analysis_params()
            },
        }
    }
}
