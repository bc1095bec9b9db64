// =============================================================================
// Microstructure — order-book and trade-tape analysis
// =============================================================================

pub mod block_flow;
pub mod pressure;

pub use block_flow::{block_trade_flow, BlockFlow, ClassificationPolicy, DEFAULT_BLOCK_THRESHOLD};
pub use pressure::{order_book_pressure, queue_signals, BookPressure, QueueSignal};
