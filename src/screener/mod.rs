// =============================================================================
// Screener — whole-market pre-filter plus bounded per-symbol analysis
// =============================================================================

pub mod intraday;
pub mod runner;
pub mod universe;

pub use runner::{screen_market, ScreenParams, ScreenReport};
pub use universe::load_exclusion_list;
