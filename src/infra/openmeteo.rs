//! Open-Meteo forecast API client.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{ForecastWindow, Location, ModelSpec};
use crate::engine::types::RawForecast;
use crate::error::Result;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::parse_open_meteo;
use crate::services::ForecastSource;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Requested variables; the order matches [`crate::engine::types::ForecastColumns`].
const VARIABLES: &[&str] = &[
    "apparent_temperature",
    "precipitation",
    "wind_speed_10m",
    "wind_direction_10m",
    "wind_gusts_10m",
];

pub struct OpenMeteoClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> OpenMeteoClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_base_url(http, FORECAST_URL)
    }

    pub fn with_base_url(http: C, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    fn query(location: &Location, window: &ForecastWindow, model: &ModelSpec) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("minutely_15", VARIABLES.join(",")),
            ("wind_speed_unit", "kn".to_string()),
            ("past_minutely_15", window.past_quarters.to_string()),
            ("forecast_minutely_15", window.future_quarters.to_string()),
            ("timeformat", "unixtime".to_string()),
            ("timezone", location.timezone.to_string()),
            ("models", model.name.to_string()),
        ]
    }
}

#[async_trait]
impl<C: HttpClient> ForecastSource for OpenMeteoClient<C> {
    #[tracing::instrument(skip_all, fields(location = location.code, models = models.len()))]
    async fn fetch_forecasts(
        &self,
        location: &Location,
        window: &ForecastWindow,
        models: &[ModelSpec],
    ) -> Result<Vec<RawForecast>> {
        let mut forecasts = Vec::with_capacity(models.len());

        // One request per model keeps every response tied to a single model id.
        for model in models {
            let query = Self::query(location, window, model);
            let bytes = fetch_bytes(&self.http, &self.base_url, &query).await?;
            debug!(model = model.name, bytes = bytes.len(), "Forecast received");

            let raw = parse_open_meteo(&bytes, model.id)?;
            info!(
                model = model.name,
                model_id = model.id.0,
                points = (raw.end - raw.start).max(0) / raw.interval.max(1),
                utc_offset_secs = raw.utc_offset_secs,
                "Forecast parsed"
            );
            forecasts.push(raw);
        }

        Ok(forecasts)
    }
}
