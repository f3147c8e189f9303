//! Decoders for the forecast, station and tide gauge JSON payloads.
//!
//! Every decoder is strict: a missing field, a null inside a station record
//! or columns of unequal length make the whole payload invalid.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;

use crate::engine::grid::Grid;
use crate::engine::types::{ForecastColumns, ModelId, RawForecast, TimePoint};
use crate::error::{RaterError, Result};

#[derive(Deserialize)]
struct OpenMeteoResponse {
    utc_offset_seconds: i32,
    minutely_15: Option<OpenMeteoMinutely15>,
}

#[derive(Deserialize)]
struct OpenMeteoMinutely15 {
    time: Vec<i64>,
    apparent_temperature: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    wind_direction_10m: Vec<Option<f64>>,
    wind_gusts_10m: Vec<Option<f64>>,
}

/// Decodes an Open-Meteo `minutely_15` forecast requested with
/// `timeformat=unixtime`.
///
/// A response without a `minutely_15` block yields an empty window, so the
/// model is treated as absent.
///
/// # Errors
///
/// Returns [`RaterError::MalformedPayload`] if fields are missing or the
/// timestamps are not evenly spaced.
pub fn parse_open_meteo(bytes: &[u8], model: ModelId) -> Result<RawForecast> {
    let response: OpenMeteoResponse =
        serde_json::from_slice(bytes).map_err(|e| RaterError::malformed("open-meteo", e.to_string()))?;

    let Some(m) = response.minutely_15 else {
        return Ok(RawForecast {
            model,
            start: 0,
            end: 0,
            interval: Grid::INTERVAL_SECS,
            utc_offset_secs: response.utc_offset_seconds,
            columns: ForecastColumns::default(),
        });
    };

    let interval = match m.time.as_slice() {
        [first, second, ..] => second - first,
        _ => Grid::INTERVAL_SECS,
    };
    if m.time.windows(2).any(|w| w[1] - w[0] != interval) {
        return Err(RaterError::malformed("open-meteo", "irregular time spacing"));
    }
    let (start, end) = match (m.time.first(), m.time.last()) {
        (Some(first), Some(last)) => (*first, last + interval),
        _ => (0, 0),
    };

    Ok(RawForecast {
        model,
        start,
        end,
        interval,
        utc_offset_secs: response.utc_offset_seconds,
        columns: ForecastColumns {
            apparent_temperature: m.apparent_temperature,
            precipitation: m.precipitation,
            wind_speed: m.wind_speed_10m,
            wind_direction: m.wind_direction_10m,
            wind_gusts: m.wind_gusts_10m,
        },
    })
}

/// One station record with the vendor's own field labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStationReading {
    pub time: TimePoint,
    pub wind_avg: f64,
    pub wind_min: f64,
    pub wind_max: f64,
}

#[derive(Deserialize)]
struct WindguruStationData {
    unixtime: Option<Vec<i64>>,
    datetime: Option<Vec<String>>,
    wind_avg: Vec<f64>,
    wind_min: Vec<f64>,
    wind_max: Vec<f64>,
}

/// Decodes a Windguru `station_data` payload (parallel arrays).
///
/// Timestamps come from `unixtime` when present, otherwise from `datetime`,
/// read as wall-clock time in `offset` unless they carry their own offset.
pub fn parse_windguru(bytes: &[u8], offset: FixedOffset) -> Result<Vec<RawStationReading>> {
    let data: WindguruStationData =
        serde_json::from_slice(bytes).map_err(|e| RaterError::malformed("windguru", e.to_string()))?;

    let times: Vec<TimePoint> = match (data.unixtime, data.datetime) {
        (Some(stamps), _) => stamps
            .into_iter()
            .map(|s| {
                DateTime::from_timestamp(s, 0)
                    .map(|t| t.with_timezone(&offset))
                    .ok_or_else(|| RaterError::malformed("windguru", format!("bad unixtime {s}")))
            })
            .collect::<Result<_>>()?,
        (None, Some(strings)) => strings
            .iter()
            .map(|s| parse_local_datetime(s, offset))
            .collect::<Result<_>>()?,
        (None, None) => {
            return Err(RaterError::malformed("windguru", "missing timestamps"));
        }
    };

    let n = times.len();
    if data.wind_avg.len() != n || data.wind_min.len() != n || data.wind_max.len() != n {
        return Err(RaterError::malformed(
            "windguru",
            format!("{n} timestamps but avg/min/max have {}/{}/{} values",
                data.wind_avg.len(), data.wind_min.len(), data.wind_max.len()),
        ));
    }

    Ok(times
        .into_iter()
        .enumerate()
        .map(|(i, time)| RawStationReading {
            time,
            wind_avg: data.wind_avg[i],
            wind_min: data.wind_min[i],
            wind_max: data.wind_max[i],
        })
        .collect())
}

fn parse_local_datetime(s: &str, offset: FixedOffset) -> Result<TimePoint> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .ok_or_else(|| RaterError::malformed("windguru", format!("bad datetime {s:?}")))
}

/// One water level measurement in raw device units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawGaugeReading {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
}

/// Decodes a PEGELONLINE `measurements.json` array.
pub fn parse_pegelonline(bytes: &[u8]) -> Result<Vec<RawGaugeReading>> {
    serde_json::from_slice(bytes).map_err(|e| RaterError::malformed("pegelonline", e.to_string()))
}
