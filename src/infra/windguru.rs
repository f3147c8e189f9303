//! Windguru station telemetry client.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::StationSpec;
use crate::engine::types::{ObservationSeries, Sample, TimePoint, WindObservation};
use crate::engine::utility::{rolling_fold, rolling_full_mean};
use crate::error::Result;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::{RawStationReading, parse_windguru};
use crate::services::StationSource;

const STATION_URL: &str = "https://www.windguru.cz/int/iapi.php";

/// The station page the vendor expects as `Referer`.
pub fn station_page(station_id: &str) -> String {
    format!("https://www.windguru.cz/station/{station_id}")
}

pub struct WindguruClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> WindguruClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_base_url(http, STATION_URL)
    }

    pub fn with_base_url(http: C, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

}

#[async_trait]
impl<C: HttpClient> StationSource for WindguruClient<C> {
    #[tracing::instrument(skip_all, fields(station = %station.id, from = %from, to = %to))]
    async fn fetch_station(
        &self,
        station: &StationSpec,
        from: TimePoint,
        to: TimePoint,
    ) -> Result<ObservationSeries<WindObservation>> {
        let query = [
            ("q", "station_data".to_string()),
            ("id_station", station.id.clone()),
            ("from", from.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("to", to.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("avg_minutes", "1".to_string()),
            ("graph_info", "1".to_string()),
        ];
        let bytes = fetch_bytes(&self.http, &self.base_url, &query).await?;

        let readings = parse_windguru(&bytes, *to.offset())?;
        let series = normalize_station(readings, station);
        if series.is_empty() {
            warn!("Station returned no usable samples");
        }
        info!(samples = series.len(), "Station data normalized");

        Ok(series)
    }
}

/// Applies the station's field swap, unit conversion and smoothing.
///
/// Smoothing takes the rolling mean of the average, the rolling minimum of
/// the minimum and the rolling maximum of the maximum over
/// `station.smoothing` samples. Samples before the first full window are
/// dropped.
pub fn normalize_station(
    mut readings: Vec<RawStationReading>,
    station: &StationSpec,
) -> ObservationSeries<WindObservation> {
    readings.sort_by_key(|r| r.time);

    let unit = station.unit;
    let (avg, min): (Vec<f64>, Vec<f64>) = readings
        .iter()
        .map(|r| {
            if station.swap_avg_min {
                (unit.to_knots(r.wind_min), unit.to_knots(r.wind_avg))
            } else {
                (unit.to_knots(r.wind_avg), unit.to_knots(r.wind_min))
            }
        })
        .unzip();
    let max: Vec<f64> = readings.iter().map(|r| unit.to_knots(r.wind_max)).collect();

    let window = station.smoothing;
    let smooth_avg = rolling_full_mean(&avg, window);
    let smooth_min = rolling_fold(&min, window, f64::min);
    let smooth_max = rolling_fold(&max, window, f64::max);

    let samples = readings
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            Some(Sample {
                time: r.time,
                value: WindObservation {
                    wind_avg: smooth_avg[i]?,
                    wind_min: smooth_min[i]?,
                    wind_max: smooth_max[i]?,
                },
            })
        })
        .collect();

    ObservationSeries::new(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedUnit;
    use chrono::{DateTime, FixedOffset};

    fn reading(minute: i64, avg: f64, min: f64, max: f64) -> RawStationReading {
        let offset = FixedOffset::east_opt(7200).unwrap();
        RawStationReading {
            time: DateTime::from_timestamp(minute * 60, 0)
                .unwrap()
                .with_timezone(&offset),
            wind_avg: avg,
            wind_min: min,
            wind_max: max,
        }
    }

    fn spec(swap: bool, unit: SpeedUnit, smoothing: usize) -> StationSpec {
        StationSpec {
            id: "3737".into(),
            swap_avg_min: swap,
            unit,
            smoothing,
        }
    }

    #[test]
    fn test_swapped_fields_are_corrected() {
        // The vendor reports avg in the min field and vice versa.
        let series = normalize_station(
            vec![reading(0, 7.0, 10.0, 15.0)],
            &spec(true, SpeedUnit::Knots, 1),
        );

        let obs = series.samples()[0].value;
        assert_eq!(obs.wind_avg, 10.0);
        assert_eq!(obs.wind_min, 7.0);
        assert_eq!(obs.wind_max, 15.0);
    }

    #[test]
    fn test_kmh_is_converted_to_knots() {
        let series = normalize_station(
            vec![reading(0, 18.52, 9.26, 37.04)],
            &spec(false, SpeedUnit::KilometersPerHour, 1),
        );

        let obs = series.samples()[0].value;
        assert!((obs.wind_avg - 10.0).abs() < 1e-9);
        assert!((obs.wind_min - 5.0).abs() < 1e-9);
        assert!((obs.wind_max - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_drops_incomplete_windows() {
        let readings = vec![
            reading(0, 10.0, 8.0, 12.0),
            reading(1, 12.0, 6.0, 16.0),
            reading(2, 14.0, 9.0, 13.0),
            reading(3, 8.0, 7.0, 11.0),
        ];

        let series = normalize_station(readings, &spec(false, SpeedUnit::Knots, 3));

        assert_eq!(series.len(), 2);
        let first = series.samples()[0].value;
        assert_eq!(first.wind_avg, 12.0);
        assert_eq!(first.wind_min, 6.0);
        assert_eq!(first.wind_max, 16.0);
        let second = series.samples()[1].value;
        assert_eq!(second.wind_min, 6.0);
        assert_eq!(second.wind_max, 16.0);
        assert_eq!(series.samples()[1].time.timestamp(), 180);
    }
}
