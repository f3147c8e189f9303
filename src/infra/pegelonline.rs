//! PEGELONLINE water level client.

use async_trait::async_trait;
use chrono::DateTime;
use tracing::info;

use crate::config::TideGauge;
use crate::engine::grid::Grid;
use crate::engine::types::{ObservationSeries, Sample, WaterLevel};
use crate::error::Result;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::{RawGaugeReading, parse_pegelonline};
use crate::services::TideSource;

const STATIONS_URL: &str = "https://www.pegelonline.wsv.de/webservices/rest-api/v2/stations";

/// Device reading that corresponds to the gauge zero.
const GAUGE_ZERO: f64 = 500.0;

pub struct PegelOnlineClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> PegelOnlineClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_base_url(http, STATIONS_URL)
    }

    pub fn with_base_url(http: C, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> TideSource for PegelOnlineClient<C> {
    #[tracing::instrument(skip_all, fields(gauge = gauge.code))]
    async fn fetch_water_level(&self, gauge: &TideGauge) -> Result<ObservationSeries<WaterLevel>> {
        let url = format!("{}/{}/W/measurements.json", self.base_url, gauge.uuid);
        let bytes = fetch_bytes(&self.http, &url, &[("start", "P10D".to_string())]).await?;

        let readings = parse_pegelonline(&bytes)?;
        let raw_count = readings.len();
        let series = normalize_water_level(readings);
        info!(raw = raw_count, quarter_hours = series.len(), "Water level normalized");

        Ok(series)
    }
}

/// Converts raw readings to centimeters and keeps the latest reading per
/// timestamp rounded to the nearest quarter hour.
pub fn normalize_water_level(mut readings: Vec<RawGaugeReading>) -> ObservationSeries<WaterLevel> {
    readings.sort_by_key(|r| r.timestamp);

    let mut samples: Vec<Sample<WaterLevel>> = Vec::with_capacity(readings.len() / 15 + 1);
    for reading in readings {
        let q = Grid::INTERVAL_SECS;
        let rounded = (reading.timestamp.timestamp() + q / 2).div_euclid(q) * q;
        let Some(time) = DateTime::from_timestamp(rounded, 0)
            .map(|t| t.with_timezone(reading.timestamp.offset()))
        else {
            continue;
        };
        let sample = Sample {
            time,
            value: WaterLevel {
                level_cm: (reading.value - GAUGE_ZERO) / 10.0,
            },
        };

        match samples.last_mut() {
            Some(last) if last.time == sample.time => *last = sample,
            _ => samples.push(sample),
        }
    }

    ObservationSeries::new(samples)
}
