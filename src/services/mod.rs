//! Seams between the comparison pipeline and the upstream data providers.

pub mod sources;

pub use sources::{ForecastSource, StationSource, TideSource};
