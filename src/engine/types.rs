//! Data types shared by the alignment, correction and scoring stages.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::engine::grid::Grid;
use crate::error::{RaterError, Result};

/// An instant carried with its UTC offset.
pub type TimePoint = DateTime<FixedOffset>;

/// Numeric model identifier as reported by the forecast provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModelId(pub u8);

/// Fixed mapping from provider model numbers to model names.
static MODEL_NAMES: &[(u8, &str)] = &[
    (11, "arome_france_hd"), // 1.5km, quarter hourly
    (75, "metno_seamless"),  // 1km, hourly
    (23, "icon_d2"),         // 2km, hourly
];

impl ModelId {
    pub fn name(self) -> Result<&'static str> {
        MODEL_NAMES
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, name)| *name)
            .ok_or(RaterError::UnknownModelId(self.0))
    }

    pub fn from_name(name: &str) -> Result<Self> {
        MODEL_NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| ModelId(*id))
            .ok_or_else(|| RaterError::UnsupportedModel(name.to_string()))
    }
}

/// Per-variable forecast columns exactly as reported, one entry per grid point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastColumns {
    pub apparent_temperature: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub wind_speed: Vec<Option<f64>>,
    pub wind_direction: Vec<Option<f64>>,
    pub wind_gusts: Vec<Option<f64>>,
}

/// One model's forecast as returned by a forecast source, before alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    pub model: ModelId,
    /// Window start, UTC seconds
    pub start: i64,
    /// Window end (exclusive), UTC seconds
    pub end: i64,
    pub interval: i64,
    pub utc_offset_secs: i32,
    pub columns: ForecastColumns,
}

/// Forecast values at a single grid point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub apparent_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_gusts: Option<f64>,
}

/// One model's forecast on its own canonical grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    model: ModelId,
    grid: Grid,
    records: Vec<ForecastRecord>,
}

impl ForecastSeries {
    pub fn new(model: ModelId, grid: Grid, records: Vec<ForecastRecord>) -> Result<Self> {
        if grid.len() != records.len() {
            return Err(RaterError::grid_mismatch(
                format!("model {}", model.0),
                format!("{} records for {} grid points", records.len(), grid.len()),
            ));
        }
        Ok(Self {
            model,
            grid,
            records,
        })
    }

    /// Builds the grid from the reported window and zips the columns onto it.
    pub fn from_raw(raw: RawForecast) -> Result<Self> {
        let grid = Grid::build(raw.start, raw.end, raw.interval, raw.utc_offset_secs)?;
        let c = raw.columns;
        let n = grid.len();

        for (name, len) in [
            ("apparent_temperature", c.apparent_temperature.len()),
            ("precipitation", c.precipitation.len()),
            ("wind_speed", c.wind_speed.len()),
            ("wind_direction", c.wind_direction.len()),
            ("wind_gusts", c.wind_gusts.len()),
        ] {
            if len != n {
                return Err(RaterError::malformed(
                    "forecast",
                    format!("column {name} has {len} values for {n} grid points"),
                ));
            }
        }

        let records = (0..n)
            .map(|i| ForecastRecord {
                apparent_temperature: c.apparent_temperature[i],
                precipitation: c.precipitation[i],
                wind_speed: c.wind_speed[i],
                wind_direction: c.wind_direction[i],
                wind_gusts: c.wind_gusts[i],
            })
            .collect();

        Self::new(raw.model, grid, records)
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn wind_gusts(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.wind_gusts).collect()
    }

    /// Iterates `(time, record)` pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (&TimePoint, &ForecastRecord)> {
        self.grid.points().iter().zip(self.records.iter())
    }

    /// Replaces the gust column, keeping everything else.
    pub(crate) fn with_gusts(mut self, gusts: Vec<Option<f64>>) -> Self {
        for (record, gust) in self.records.iter_mut().zip(gusts) {
            record.wind_gusts = gust;
        }
        self
    }
}

/// A single observation sample at its true (irregular) time.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub time: TimePoint,
    pub value: T,
}

/// Wind measured at a station, in knots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindObservation {
    pub wind_avg: f64,
    pub wind_min: f64,
    pub wind_max: f64,
}

/// Water level at a tide gauge, in centimeters relative to the gauge zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterLevel {
    pub level_cm: f64,
}

/// Time-ordered samples from one observation source.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries<T> {
    samples: Vec<Sample<T>>,
}

impl<T> ObservationSeries<T> {
    /// Orders the samples by time. Equal timestamps keep their arrival order.
    pub fn new(mut samples: Vec<Sample<T>>) -> Self {
        samples.sort_by_key(|s| s.time);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample<T>] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<T> Default for ObservationSeries<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}
