pub mod composite;
pub mod interpretation;

pub use composite::{CompositeScorer, ScoreBreakdown, ScoreInputs, ScoreThresholds};
