//! One comparison run from upstream fetches to the finalized table.

use chrono::TimeDelta;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::engine::combine::{CombinedTable, CombinedTableBuilder};
use crate::engine::reindex::{AlignedObservation, ReindexPolicy, reindex};
use crate::engine::types::{ForecastSeries, TimePoint};
use crate::error::Result;
use crate::services::{ForecastSource, StationSource, TideSource};

/// The three upstreams of a run.
pub struct Pipeline<F, S, T> {
    pub forecasts: F,
    pub station: S,
    pub tide: T,
}

impl<F, S, T> Pipeline<F, S, T>
where
    F: ForecastSource,
    S: StationSource,
    T: TideSource,
{
    pub fn new(forecasts: F, station: S, tide: T) -> Self {
        Self {
            forecasts,
            station,
            tide,
        }
    }

    /// Fetches every source, aligns the observations onto the union of the
    /// model grids and scores each model.
    ///
    /// Upstreams are awaited one after another. Grid points after `now` are
    /// left without ground truth.
    #[tracing::instrument(skip_all, fields(location = config.location.code, now = %now))]
    pub async fn run(&self, config: &ResolvedConfig, now: TimePoint) -> Result<CombinedTable> {
        let raw = self
            .forecasts
            .fetch_forecasts(&config.location, &config.window, &config.models)
            .await?;

        let mut builder = CombinedTableBuilder::new();
        for raw in raw {
            let mut series = ForecastSeries::from_raw(raw)?;
            if config.model(series.model()).is_some_and(|m| m.repair_gust_dropouts) {
                series = series.with_gusts_repaired();
            }
            builder.push(series)?;
        }
        let grid = builder.grid()?;
        info!(models = builder.model_count(), rows = grid.len(), "Forecast grid built");

        let wind = match grid.first() {
            Some(first) if *first <= now => {
                let smoothing = TimeDelta::minutes(config.station.smoothing as i64);
                let from = *first - config.staleness_bound - smoothing;
                let observations = self.station.fetch_station(&config.station, from, now).await?;
                reindex(
                    &observations,
                    &grid,
                    &ReindexPolicy::new(config.staleness_bound, now),
                )
            }
            _ => {
                info!("No grid point has passed yet, skipping station fetch");
                AlignedObservation::empty(&grid)
            }
        };

        let tide = match &config.tide {
            Some(gauge) => {
                let levels = self.tide.fetch_water_level(gauge).await?;
                Some(reindex(
                    &levels,
                    &grid,
                    &ReindexPolicy::new(config.tide_staleness_bound, now),
                ))
            }
            None => None,
        };

        builder.finish(wind, tide, &config.scorer)
    }
}
