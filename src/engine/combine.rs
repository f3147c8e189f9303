//! Joins per-model forecasts, aligned observations and scores into one table.

use serde::Serialize;
use tracing::{info, warn};

use crate::engine::grid::Grid;
use crate::engine::reindex::AlignedObservation;
use crate::engine::score::{ErrorScorer, ScoredSeries};
use crate::engine::types::{ForecastRecord, ForecastSeries, ModelId, TimePoint, WaterLevel, WindObservation};
use crate::error::{RaterError, Result};

/// Wind direction as a unit vector, east and north components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionVector {
    pub east: f64,
    pub north: f64,
}

impl DirectionVector {
    pub fn from_degrees(degrees: f64) -> Self {
        let radians = degrees.to_radians();
        Self {
            east: radians.sin(),
            north: radians.cos(),
        }
    }
}

/// One model's forecast positioned on the run grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelColumns {
    pub model: ModelId,
    pub name: String,
    /// All-`None` records where the model has no data
    pub records: Vec<ForecastRecord>,
    pub directions: Vec<Option<DirectionVector>>,
}

impl ModelColumns {
    pub fn wind_speed(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.wind_speed).collect()
    }
}

/// The finalized join of every model, observation stream and score on one
/// grid.
#[derive(Debug, Clone)]
pub struct CombinedTable {
    grid: Grid,
    models: Vec<ModelColumns>,
    wind: AlignedObservation<WindObservation>,
    tide: Option<AlignedObservation<WaterLevel>>,
    scores: Vec<ScoredSeries>,
}

impl CombinedTable {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn models(&self) -> &[ModelColumns] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ModelColumns> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn wind(&self) -> &AlignedObservation<WindObservation> {
        &self.wind
    }

    pub fn tide(&self) -> Option<&AlignedObservation<WaterLevel>> {
        self.tide.as_ref()
    }

    pub fn scores(&self) -> &[ScoredSeries] {
        &self.scores
    }

    pub fn score(&self, name: &str) -> Option<&ScoredSeries> {
        self.scores.iter().find(|s| s.model() == name)
    }

    pub fn times(&self) -> &[TimePoint] {
        self.grid.points()
    }
}

/// Accumulates per-model forecasts, then produces one [`CombinedTable`].
///
/// Models may start and end at different grid points. The run grid is the
/// union of all model grids; each model is padded with empty rows on either
/// side so that row `i` means the same instant for every column.
#[derive(Debug, Default)]
pub struct CombinedTableBuilder {
    forecasts: Vec<(String, ForecastSeries)>,
}

impl CombinedTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model's forecast. A forecast with an empty grid is treated as
    /// an absent model and skipped.
    ///
    /// # Errors
    ///
    /// Rejects a model that was already added, or whose id has no name.
    pub fn push(&mut self, series: ForecastSeries) -> Result<&mut Self> {
        let name = series.model().name()?.to_string();
        if self.forecasts.iter().any(|(n, _)| *n == name) {
            return Err(RaterError::Config(format!("model {name} added twice")));
        }
        if series.is_empty() {
            warn!(model = %name, "Model has an empty grid, treating as absent");
            return Ok(self);
        }
        self.forecasts.push((name, series));
        Ok(self)
    }

    pub fn model_count(&self) -> usize {
        self.forecasts.len()
    }

    /// The run grid every column will be placed on.
    pub fn grid(&self) -> Result<Grid> {
        Grid::span(self.forecasts.iter().map(|(_, s)| s.grid()))
    }

    /// Pads every model onto the run grid, scores each against `wind`, and
    /// returns the finalized table.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::GridMismatch`] if an observation stream was
    /// aligned against a different grid, or a model cannot be placed
    /// without shifting it.
    pub fn finish(
        self,
        wind: AlignedObservation<WindObservation>,
        tide: Option<AlignedObservation<WaterLevel>>,
        scorer: &ErrorScorer,
    ) -> Result<CombinedTable> {
        let grid = self.grid()?;

        if wind.grid() != &grid {
            return Err(RaterError::grid_mismatch(
                "station observations",
                "aligned against a different grid",
            ));
        }
        if let Some(tide) = &tide {
            if tide.grid() != &grid {
                return Err(RaterError::grid_mismatch(
                    "water level",
                    "aligned against a different grid",
                ));
            }
        }

        let models = self
            .forecasts
            .into_iter()
            .map(|(name, series)| pad_onto(&grid, name, series))
            .collect::<Result<Vec<_>>>()?;

        let observed = wind.values(|w| w.wind_avg);
        let scores: Vec<ScoredSeries> = models
            .iter()
            .map(|m| scorer.score(&m.name, &m.wind_speed(), &observed))
            .collect();

        info!(
            rows = grid.len(),
            models = models.len(),
            observed_rows = wind.count_with_value(),
            "Combined table finalized"
        );

        Ok(CombinedTable {
            grid,
            models,
            wind,
            tide,
            scores,
        })
    }
}

fn pad_onto(grid: &Grid, name: String, series: ForecastSeries) -> Result<ModelColumns> {
    let offset = series
        .grid()
        .first()
        .and_then(|first| grid.position(first))
        .ok_or_else(|| RaterError::grid_mismatch(&name, "first point is not on the run grid"))?;

    if offset + series.len() > grid.len() {
        return Err(RaterError::grid_mismatch(&name, "extends past the run grid"));
    }

    let mut records = vec![ForecastRecord::default(); grid.len()];
    records[offset..offset + series.len()].copy_from_slice(series.records());

    let directions = records
        .iter()
        .map(|r| r.wind_direction.map(DirectionVector::from_degrees))
        .collect();

    if offset > 0 {
        info!(model = %name, padded_rows = offset, "Model starts later, left-padded");
    }

    Ok(ModelColumns {
        model: series.model(),
        name,
        records,
        directions,
    })
}
