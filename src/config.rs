//! Run configuration and the built-in registries it resolves against.
//!
//! A [`RunConfig`] is plain data, deserialized from JSON with every field
//! defaulted:
//! ```json
//! {
//!   "location": "wac",
//!   "models": ["arome_france_hd", "icon_d2", "metno_seamless"],
//!   "tide_gauge": "kalkgrund",
//!   "hours_to_show": 72,
//!   "past_hours": 18
//! }
//! ```
//! [`RunConfig::resolve`] validates it and produces a [`ResolvedConfig`];
//! every configuration error surfaces there, before anything is fetched.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::score::ErrorScorer;
use crate::engine::types::ModelId;
use crate::error::{RaterError, Result};

/// A forecast location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub code: &'static str,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: &'static str,
}

static LOCATIONS: &[(&[&str], Location)] = &[
    (
        &["wac", "wak"],
        Location {
            code: "wac",
            name: "Wackerballig",
            latitude: 54.75455,
            longitude: 9.87333,
            timezone: "Europe/Berlin",
        },
    ),
    (
        &["fal"],
        Location {
            code: "fal",
            name: "Falshöft",
            latitude: 54.77019,
            longitude: 9.965711,
            timezone: "Europe/Berlin",
        },
    ),
];

impl Location {
    /// Matches anything starting with a known prefix, case-insensitively.
    pub fn resolve(code: &str) -> Result<Self> {
        let lower = code.to_lowercase();
        LOCATIONS
            .iter()
            .find(|(prefixes, _)| prefixes.iter().any(|p| lower.starts_with(p)))
            .map(|(_, location)| *location)
            .ok_or_else(|| RaterError::UnsupportedLocation(code.to_string()))
    }
}

/// A forecast model and whether its gust column needs dropout repair.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub id: ModelId,
    pub name: &'static str,
    pub repair_gust_dropouts: bool,
}

/// Unit a station vendor reports wind speed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    Knots,
    KilometersPerHour,
}

impl SpeedUnit {
    pub fn to_knots(self, value: f64) -> f64 {
        match self {
            SpeedUnit::Knots => value,
            SpeedUnit::KilometersPerHour => value / 1.852,
        }
    }
}

/// A wind station and the quirks of its vendor feed.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSpec {
    pub id: String,
    /// The vendor labels average wind as minimum and vice versa
    pub swap_avg_min: bool,
    pub unit: SpeedUnit,
    /// Rolling window over native samples; 1 disables smoothing
    pub smoothing: usize,
}

/// Station id and whether its vendor swaps the avg/min fields.
static STATIONS: &[(&str, bool)] = &[("3737", true)];

/// A tide gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct TideGauge {
    pub code: &'static str,
    pub uuid: &'static str,
}

static TIDE_GAUGES: &[TideGauge] = &[
    TideGauge {
        code: "kalkgrund",
        uuid: "22b7dcb3-8c42-4f71-9191-49143ba3a828",
    },
    TideGauge {
        code: "kappeln",
        uuid: "b09f2243-60f0-469a-8f3b-0ea6abc83267",
    },
];

impl TideGauge {
    /// Accepts a registered code or a raw gauge UUID.
    pub fn resolve(code: &str) -> Result<Self> {
        TIDE_GAUGES
            .iter()
            .find(|g| g.code.eq_ignore_ascii_case(code) || g.uuid == code)
            .cloned()
            .ok_or_else(|| RaterError::UnsupportedTideGauge(code.to_string()))
    }
}

/// Forecast window in quarter hours either side of now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    pub past_quarters: u32,
    pub future_quarters: u32,
}

impl ForecastWindow {
    /// Converts whole hours either side of now into quarter hours.
    pub fn from_hours(past_hours: u32, future_hours: u32) -> Result<Self> {
        let quarters = |hours: u32| {
            hours
                .checked_mul(4)
                .ok_or_else(|| RaterError::Config(format!("{hours} hours is too large a window")))
        };
        Ok(Self {
            past_quarters: quarters(past_hours)?,
            future_quarters: quarters(future_hours)?,
        })
    }
}

/// Retry and cache settings for every upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportConfig {
    pub retries: usize,
    pub backoff_factor: f64,
    pub cache_ttl: Duration,
}

/// User-facing configuration of one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub location: String,
    pub models: Vec<String>,
    pub station: String,
    pub station_unit: SpeedUnit,
    pub station_smoothing: usize,
    pub tide_gauge: Option<String>,
    pub hours_to_show: u32,
    pub past_hours: u32,
    pub staleness_minutes: i64,
    pub tide_staleness_minutes: i64,
    pub rolling_window: usize,
    pub error_clip: f64,
    pub gust_repair_models: Vec<String>,
    pub retries: usize,
    pub backoff_factor: f64,
    pub cache_ttl_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            location: "wac".to_string(),
            models: vec![
                "arome_france_hd".to_string(),
                "icon_d2".to_string(),
                "metno_seamless".to_string(),
            ],
            station: "3737".to_string(),
            station_unit: SpeedUnit::Knots,
            station_smoothing: 15,
            tide_gauge: Some("kalkgrund".to_string()),
            hours_to_show: 72,
            past_hours: 18,
            staleness_minutes: 15,
            tide_staleness_minutes: 60,
            rolling_window: 10,
            error_clip: 20.0,
            gust_repair_models: vec!["icon_d2".to_string()],
            retries: 5,
            backoff_factor: 0.2,
            cache_ttl_secs: 3600,
        }
    }
}

/// A validated run configuration with every code resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub location: Location,
    pub models: Vec<ModelSpec>,
    pub station: StationSpec,
    pub tide: Option<TideGauge>,
    pub window: ForecastWindow,
    pub staleness_bound: TimeDelta,
    pub tide_staleness_bound: TimeDelta,
    pub scorer: ErrorScorer,
    pub transport: TransportConfig,
}

impl ResolvedConfig {
    pub fn model(&self, id: ModelId) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }
}

impl RunConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Validates every setting against the registries.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let location = Location::resolve(&self.location)?;

        if self.models.is_empty() {
            return Err(RaterError::Config("no models configured".into()));
        }
        let mut models = Vec::with_capacity(self.models.len());
        for name in &self.models {
            let id = ModelId::from_name(name)?;
            if models.iter().any(|m: &ModelSpec| m.id == id) {
                return Err(RaterError::Config(format!("model {name} listed twice")));
            }
            let repair_gust_dropouts = self
                .gust_repair_models
                .iter()
                .any(|r| r.eq_ignore_ascii_case(name));
            models.push(ModelSpec {
                id,
                name: id.name()?,
                repair_gust_dropouts,
            });
        }

        let (id, swap_avg_min) = STATIONS
            .iter()
            .find(|(id, _)| *id == self.station)
            .map(|(id, swap)| (id.to_string(), *swap))
            .ok_or_else(|| RaterError::UnsupportedStation(self.station.clone()))?;
        if self.station_smoothing == 0 {
            return Err(RaterError::Config("station_smoothing must be at least 1".into()));
        }

        let tide = self.tide_gauge.as_deref().map(TideGauge::resolve).transpose()?;

        if self.hours_to_show == 0 && self.past_hours == 0 {
            return Err(RaterError::Config("empty forecast window".into()));
        }
        if self.staleness_minutes < 0 || self.tide_staleness_minutes < 0 {
            return Err(RaterError::Config("staleness bounds must not be negative".into()));
        }
        if self.rolling_window == 0 {
            return Err(RaterError::Config("rolling_window must be at least 1".into()));
        }
        if self.error_clip.is_nan() || self.error_clip <= 0.0 {
            return Err(RaterError::Config("error_clip must be positive".into()));
        }
        if self.backoff_factor < 0.0 {
            return Err(RaterError::Config("backoff_factor must not be negative".into()));
        }

        let window = ForecastWindow::from_hours(self.past_hours, self.hours_to_show)?;
        let minutes = |m: i64| {
            TimeDelta::try_minutes(m).ok_or_else(|| {
                RaterError::Config(format!("staleness bound of {m} minutes is too large"))
            })
        };

        Ok(ResolvedConfig {
            location,
            models,
            station: StationSpec {
                id,
                swap_avg_min,
                unit: self.station_unit,
                smoothing: self.station_smoothing,
            },
            tide,
            window,
            staleness_bound: minutes(self.staleness_minutes)?,
            tide_staleness_bound: minutes(self.tide_staleness_minutes)?,
            scorer: ErrorScorer {
                window: self.rolling_window,
                clip: self.error_clip,
            },
            transport: TransportConfig {
                retries: self.retries,
                backoff_factor: self.backoff_factor,
                cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_default_config_resolves() {
        let resolved = RunConfig::default().resolve().unwrap();

        assert_eq!(resolved.location.name, "Wackerballig");
        assert_eq!(resolved.models.len(), 3);
        assert!(resolved.model(ModelId(23)).unwrap().repair_gust_dropouts);
        assert!(!resolved.model(ModelId(11)).unwrap().repair_gust_dropouts);
        assert_eq!(resolved.window.future_quarters, 288);
        assert_eq!(resolved.window.past_quarters, 72);
        assert_eq!(resolved.staleness_bound, TimeDelta::minutes(15));
        assert_eq!(resolved.scorer, ErrorScorer::default());
        assert!(resolved.station.swap_avg_min);
    }

    #[test]
    fn test_location_prefix_matching() {
        assert_eq!(Location::resolve("Wackerballig").unwrap().code, "wac");
        assert_eq!(Location::resolve("wakeboard").unwrap().code, "wac");
        assert_eq!(Location::resolve("FALshoeft").unwrap().code, "fal");
    }

    #[test]
    fn test_unsupported_location_is_config_error() {
        let config = RunConfig {
            location: "kiel".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(RaterError::UnsupportedLocation(_))
        ));
    }

    #[test]
    fn test_unknown_model_and_station_rejected() {
        let bad_model = RunConfig {
            models: vec!["gfs".into()],
            ..Default::default()
        };
        let bad_station = RunConfig {
            station: "1".into(),
            ..Default::default()
        };

        assert!(matches!(
            bad_model.resolve(),
            Err(RaterError::UnsupportedModel(_))
        ));
        assert!(matches!(
            bad_station.resolve(),
            Err(RaterError::UnsupportedStation(_))
        ));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let config = RunConfig {
            models: vec!["icon_d2".into(), "ICON_D2".into()],
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(RaterError::Config(_))));
    }

    #[test]
    fn test_tide_gauge_by_code_or_uuid() {
        assert_eq!(TideGauge::resolve("kappeln").unwrap().code, "kappeln");
        assert_eq!(
            TideGauge::resolve("22b7dcb3-8c42-4f71-9191-49143ba3a828")
                .unwrap()
                .code,
            "kalkgrund"
        );
        assert!(TideGauge::resolve("nowhere").is_err());
    }

    #[test]
    fn test_kmh_conversion() {
        assert_eq!(SpeedUnit::Knots.to_knots(10.0), 10.0);
        assert!((SpeedUnit::KilometersPerHour.to_knots(18.52) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let path = format!("{}/wind_rater_config_test.json", env::temp_dir().display());
        fs::write(&path, r#"{"location": "fal", "tide_gauge": null, "staleness_minutes": 30}"#)
            .unwrap();

        let config = RunConfig::load(&path).unwrap();
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.location.code, "fal");
        assert_eq!(resolved.tide, None);
        assert_eq!(resolved.staleness_bound, TimeDelta::minutes(30));
        assert_eq!(config.models.len(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_oversized_window_is_config_error() {
        let config = RunConfig {
            hours_to_show: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(RaterError::Config(_))));

        let config = RunConfig {
            past_hours: u32::MAX / 4 + 1,
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(RaterError::Config(_))));
    }

    #[test]
    fn test_oversized_staleness_is_config_error() {
        let config = RunConfig {
            staleness_minutes: i64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(RaterError::Config(_))));
    }

    #[test]
    fn test_window_from_hours() {
        let window = ForecastWindow::from_hours(2, 36).unwrap();
        assert_eq!(window.past_quarters, 8);
        assert_eq!(window.future_quarters, 144);
    }
}
