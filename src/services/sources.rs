//! Traits for the three upstreams a comparison run reads from.

use async_trait::async_trait;

use crate::config::{ForecastWindow, Location, ModelSpec, StationSpec, TideGauge};
use crate::engine::types::{ObservationSeries, RawForecast, TimePoint, WaterLevel, WindObservation};
use crate::error::Result;

/// Provides numerical weather model forecasts.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Returns one forecast per requested model, in request order.
    async fn fetch_forecasts(
        &self,
        location: &Location,
        window: &ForecastWindow,
        models: &[ModelSpec],
    ) -> Result<Vec<RawForecast>>;
}

/// Provides wind observations from a coastal station.
#[async_trait]
pub trait StationSource: Send + Sync {
    /// Returns observations between `from` and `to`, already converted to
    /// knots, with vendor field quirks resolved.
    async fn fetch_station(
        &self,
        station: &StationSpec,
        from: TimePoint,
        to: TimePoint,
    ) -> Result<ObservationSeries<WindObservation>>;
}

/// Provides water levels from a tide gauge.
#[async_trait]
pub trait TideSource: Send + Sync {
    /// Returns water levels in centimeters, one per quarter hour.
    async fn fetch_water_level(&self, gauge: &TideGauge) -> Result<ObservationSeries<WaterLevel>>;
}
