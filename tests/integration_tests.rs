use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta};
use std::sync::Mutex;

use wind_forecast_rater::config::{
    ForecastWindow, Location, ModelSpec, RunConfig, StationSpec, TideGauge,
};
use wind_forecast_rater::engine::Pipeline;
use wind_forecast_rater::engine::reindex::Alignment;
use wind_forecast_rater::engine::types::{
    ForecastColumns, ModelId, ObservationSeries, RawForecast, Sample, TimePoint, WaterLevel,
    WindObservation,
};
use wind_forecast_rater::error::{FetchError, RaterError, Result};
use wind_forecast_rater::services::{ForecastSource, StationSource, TideSource};

const OFFSET: i32 = 7200;
/// 2024-08-30T10:00:00+02:00
const START: i64 = 1_725_004_800;

fn at(secs: i64) -> TimePoint {
    DateTime::from_timestamp(secs, 0)
        .unwrap()
        .with_timezone(&FixedOffset::east_opt(OFFSET).unwrap())
}

fn raw(model: u8, first_quarter: i64, speeds: &[Option<f64>], gusts: &[Option<f64>]) -> RawForecast {
    let n = speeds.len();
    let start = START + first_quarter * 900;
    RawForecast {
        model: ModelId(model),
        start,
        end: start + 900 * n as i64,
        interval: 900,
        utc_offset_secs: OFFSET,
        columns: ForecastColumns {
            apparent_temperature: vec![Some(15.0); n],
            precipitation: vec![Some(0.0); n],
            wind_speed: speeds.to_vec(),
            wind_direction: vec![Some(240.0); n],
            wind_gusts: gusts.to_vec(),
        },
    }
}

struct FakeForecasts(Vec<RawForecast>);

#[async_trait]
impl ForecastSource for FakeForecasts {
    async fn fetch_forecasts(
        &self,
        _location: &Location,
        _window: &ForecastWindow,
        models: &[ModelSpec],
    ) -> Result<Vec<RawForecast>> {
        Ok(self
            .0
            .iter()
            .filter(|r| models.iter().any(|m| m.id == r.model))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeStation {
    samples: Vec<(i64, f64)>,
    requested: Mutex<Option<(TimePoint, TimePoint)>>,
}

#[async_trait]
impl StationSource for FakeStation {
    async fn fetch_station(
        &self,
        _station: &StationSpec,
        from: TimePoint,
        to: TimePoint,
    ) -> Result<ObservationSeries<WindObservation>> {
        *self.requested.lock().unwrap() = Some((from, to));
        Ok(ObservationSeries::new(
            self.samples
                .iter()
                .map(|&(secs, avg)| Sample {
                    time: at(secs),
                    value: WindObservation {
                        wind_avg: avg,
                        wind_min: avg - 3.0,
                        wind_max: avg + 4.0,
                    },
                })
                .collect(),
        ))
    }
}

struct FakeTide(std::result::Result<Vec<(i64, f64)>, u16>);

#[async_trait]
impl TideSource for FakeTide {
    async fn fetch_water_level(&self, _gauge: &TideGauge) -> Result<ObservationSeries<WaterLevel>> {
        match &self.0 {
            Ok(levels) => Ok(ObservationSeries::new(
                levels
                    .iter()
                    .map(|&(secs, level_cm)| Sample {
                        time: at(secs),
                        value: WaterLevel { level_cm },
                    })
                    .collect(),
            )),
            Err(status) => Err(FetchError::Status {
                status: *status,
                body: String::new(),
            }
            .into()),
        }
    }
}

fn config(models: &[&str]) -> RunConfig {
    RunConfig {
        models: models.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    let speeds: Vec<Option<f64>> = (0..10).map(|i| Some(10.0 + i as f64)).collect();
    let gusts = vec![Some(20.0); 10];
    let forecasts = FakeForecasts(vec![
        raw(11, 0, &speeds, &gusts),
        raw(23, 2, &speeds[..8], &gusts[..8]),
    ]);
    // Samples at +0, +7 and +52 minutes; now is +60.
    let station = FakeStation {
        samples: vec![(START, 10.0), (START + 420, 12.0), (START + 3120, 14.0)],
        ..Default::default()
    };
    let tide = FakeTide(Ok(vec![(START, -20.0), (START + 1800, -18.0)]));
    let pipeline = Pipeline::new(forecasts, station, tide);

    let resolved = config(&["arome_france_hd", "icon_d2"]).resolve().unwrap();
    let now = at(START + 3600);
    let table = pipeline.run(&resolved, now).await.unwrap();

    assert_eq!(table.len(), 10);
    assert_eq!(table.times()[0], at(START));

    let wind = table.wind().entries();
    assert_eq!(wind[0].value().map(|w| w.wind_avg), Some(10.0));
    assert_eq!(wind[1].value().map(|w| w.wind_avg), Some(12.0));
    assert_eq!(wind[1].lag(), Some(TimeDelta::minutes(8)));
    assert!(matches!(wind[2], Alignment::Stale { .. }));
    assert!(matches!(wind[3], Alignment::Stale { .. }));
    assert_eq!(wind[4].lag(), Some(TimeDelta::minutes(8)));
    assert!(wind[5..].iter().all(|e| matches!(e, Alignment::Pending)));

    let icon = table.model("icon_d2").unwrap();
    assert_eq!(icon.records[0].wind_speed, None);
    assert_eq!(icon.records[2].wind_speed, Some(10.0));

    let arome = table.score("arome_france_hd").unwrap();
    assert_eq!(arome.summary.observed_rows, 3);
    // Errors 0, 1 and 0 knots at +0, +15 and +60.
    assert_eq!(arome.summary.clipped_sse, 1.0);
    let icon_score = table.score("icon_d2").unwrap();
    // icon_d2 starts at +30, so only +60 has both sides: 12 vs 14.
    assert_eq!(icon_score.summary.observed_rows, 1);
    assert_eq!(icon_score.summary.clipped_sse, 4.0);
    assert_eq!(icon_score.summary.grade, "B");

    let tide = table.tide().unwrap().entries();
    assert_eq!(tide[3].value().map(|l| l.level_cm), Some(-18.0));
    assert_eq!(tide[4].lag(), Some(TimeDelta::minutes(30)));
}

#[tokio::test]
async fn test_station_range_covers_staleness_and_smoothing() {
    let speeds = vec![Some(10.0); 8];
    let pipeline = Pipeline::new(
        FakeForecasts(vec![raw(11, 0, &speeds, &speeds)]),
        FakeStation::default(),
        FakeTide(Ok(Vec::new())),
    );
    let resolved = config(&["arome_france_hd"]).resolve().unwrap();
    let now = at(START + 900 * 3 + 60);

    pipeline.run(&resolved, now).await.unwrap();

    let requested = *pipeline.station.requested.lock().unwrap();
    let (from, to) = requested.unwrap();
    assert_eq!(from, at(START) - TimeDelta::minutes(15 + 15));
    assert_eq!(to, now);
}

#[tokio::test]
async fn test_future_grid_skips_station() {
    let speeds = vec![Some(10.0); 4];
    let pipeline = Pipeline::new(
        FakeForecasts(vec![raw(11, 0, &speeds, &speeds)]),
        FakeStation::default(),
        FakeTide(Ok(Vec::new())),
    );
    let resolved = config(&["arome_france_hd"]).resolve().unwrap();

    let table = pipeline.run(&resolved, at(START - 60)).await.unwrap();

    assert!(pipeline.station.requested.lock().unwrap().is_none());
    assert_eq!(table.wind().count_with_value(), 0);
    assert_eq!(table.score("arome_france_hd").unwrap().summary.grade, "-");
}

#[tokio::test]
async fn test_gust_repair_only_for_flagged_models() {
    let speeds = vec![Some(12.0); 12];
    let mut gusts = vec![Some(18.0); 12];
    gusts[6] = Some(0.0);
    let pipeline = Pipeline::new(
        FakeForecasts(vec![raw(11, 0, &speeds, &gusts), raw(23, 0, &speeds, &gusts)]),
        FakeStation::default(),
        FakeTide(Ok(Vec::new())),
    );
    let resolved = config(&["arome_france_hd", "icon_d2"]).resolve().unwrap();

    let table = pipeline.run(&resolved, at(START)).await.unwrap();

    assert_eq!(
        table.model("arome_france_hd").unwrap().records[6].wind_gusts,
        Some(0.0)
    );
    assert_eq!(table.model("icon_d2").unwrap().records[6].wind_gusts, Some(18.0));
}

#[tokio::test]
async fn test_tide_failure_fails_the_run() {
    let speeds = vec![Some(10.0); 4];
    let pipeline = Pipeline::new(
        FakeForecasts(vec![raw(11, 0, &speeds, &speeds)]),
        FakeStation::default(),
        FakeTide(Err(503)),
    );
    let resolved = config(&["arome_france_hd"]).resolve().unwrap();

    let err = pipeline.run(&resolved, at(START)).await.unwrap_err();
    assert!(matches!(err, RaterError::Fetch(FetchError::Status { status: 503, .. })));
}

#[tokio::test]
async fn test_no_tide_gauge_configured() {
    let speeds = vec![Some(10.0); 4];
    let pipeline = Pipeline::new(
        FakeForecasts(vec![raw(11, 0, &speeds, &speeds)]),
        FakeStation::default(),
        FakeTide(Err(500)),
    );
    let resolved = RunConfig {
        models: vec!["arome_france_hd".into()],
        tide_gauge: None,
        ..Default::default()
    }
    .resolve()
    .unwrap();

    let table = pipeline.run(&resolved, at(START)).await.unwrap();
    assert!(table.tide().is_none());
}

#[tokio::test]
async fn test_malformed_forecast_fails_the_run() {
    let mut bad = raw(11, 0, &[Some(1.0), Some(2.0)], &[Some(1.0), Some(2.0)]);
    bad.columns.wind_direction.pop();
    let pipeline = Pipeline::new(
        FakeForecasts(vec![bad]),
        FakeStation::default(),
        FakeTide(Ok(Vec::new())),
    );
    let resolved = config(&["arome_france_hd"]).resolve().unwrap();

    let err = pipeline.run(&resolved, at(START)).await.unwrap_err();
    assert!(matches!(err, RaterError::MalformedPayload { .. }));
}
