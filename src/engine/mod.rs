//! Alignment, correction and scoring of forecasts against observations.

pub mod artifact;
pub mod combine;
pub mod grade;
pub mod grid;
pub mod pipeline;
pub mod reindex;
pub mod score;
pub mod types;
pub mod utility;

pub use combine::{CombinedTable, CombinedTableBuilder};
pub use pipeline::Pipeline;
pub use score::ErrorScorer;
