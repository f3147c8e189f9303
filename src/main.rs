//! CLI entry point for the wind forecast rater.
//!
//! Provides subcommands for scoring forecast models against station
//! observations, inspecting the raw upstreams, and maintaining the forecast
//! archive.

use anyhow::{Context, Result};
use chrono::{Local, TimeDelta};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use wind_forecast_rater::{
    config::{ForecastWindow, ResolvedConfig, RunConfig, TideGauge},
    engine::{Pipeline, types::ForecastSeries},
    fetch::{BasicClient, StaticHeaders, Transport, transport},
    infra::{OpenMeteoClient, PegelOnlineClient, WindguruClient, windguru},
    output::{ScoreHistoryRecord, append_record, print_json, print_pretty, summaries, write_table},
    services::{ForecastSource, StationSource, TideSource},
    storage::{Bucket, ForecastArchive},
};

#[derive(Parser)]
#[command(name = "wind_forecast_rater")]
#[command(about = "Rates wind forecast models against station observations", long_about = None)]
struct Cli {
    /// JSON run configuration; every field is optional
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every configured model against the station and print summaries
    Compare {
        /// Location code, e.g. wac or fal
        #[arg(short, long)]
        location: Option<String>,

        /// Comma-separated model names
        #[arg(short, long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Forecast hours after now
        #[arg(short = 's', long)]
        hours_to_show: Option<u32>,

        /// Forecast hours before now
        #[arg(short, long)]
        past_hours: Option<u32>,

        /// Tide gauge code or UUID
        #[arg(short, long)]
        tide_gauge: Option<String>,

        /// Skip the water level
        #[arg(long, default_value_t = false)]
        no_tide: bool,

        /// CSV file for the combined table
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file to append per-model score rows to
        #[arg(long)]
        history: Option<String>,
    },
    /// Fetch and log recent station observations
    Station {
        /// Minutes of history to fetch
        #[arg(short, long, default_value_t = 60)]
        minutes: i64,
    },
    /// Fetch and log water levels of a tide gauge
    WaterLevel {
        /// Tide gauge code or UUID
        #[arg(short, long, default_value = "kalkgrund")]
        gauge: String,
    },
    /// Archive the current forecasts into the horizon buckets
    SaveForecast {
        /// Locations to archive
        #[arg(short, long, value_delimiter = ',', default_value = "wac,fal")]
        locations: Vec<String>,

        /// Forecast horizon in hours
        #[arg(short = 's', long, default_value_t = 36)]
        hours_to_show: u32,

        /// Archive directory
        #[arg(short, long, default_value = "data/forecasts")]
        dir: String,
    },
    /// Print an archive bucket
    ShowData {
        #[arg(short, long)]
        location: String,

        #[arg(short, long)]
        model: String,

        /// Horizon hour of the bucket
        #[arg(short = 's', long, default_value_t = 36)]
        hour_to_show: u32,

        #[arg(short, long, default_value = "data/forecasts")]
        dir: String,
    },
    /// Drop the last rows of an archive bucket
    DropLast {
        #[arg(short, long)]
        location: String,

        #[arg(short, long)]
        model: String,

        /// Horizon hour of the bucket
        #[arg(short = 's', long)]
        hour: u32,

        /// Number of rows to drop
        #[arg(short, long)]
        nrows: usize,

        #[arg(short, long, default_value = "data/forecasts")]
        dir: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/wind_forecast_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("wind_forecast_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut run_config = match &cli.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading config {path}"))?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::Compare {
            location,
            models,
            hours_to_show,
            past_hours,
            tide_gauge,
            no_tide,
            output,
            history,
        } => {
            if let Some(location) = location {
                run_config.location = location;
            }
            if let Some(models) = models {
                run_config.models = models;
            }
            if let Some(hours) = hours_to_show {
                run_config.hours_to_show = hours;
            }
            if let Some(hours) = past_hours {
                run_config.past_hours = hours;
            }
            if tide_gauge.is_some() {
                run_config.tide_gauge = tide_gauge;
            }
            if no_tide {
                run_config.tide_gauge = None;
            }
            let config = run_config.resolve()?;
            compare(&config, output.as_deref(), history.as_deref()).await?;
        }
        Commands::Station { minutes } => {
            let config = run_config.resolve()?;
            let now = Local::now().fixed_offset();
            let from = now - TimeDelta::minutes(minutes.max(0));
            let series = station_client(&config)?
                .fetch_station(&config.station, from, now)
                .await?;

            for sample in series.samples() {
                info!(
                    time = %sample.time,
                    wind_avg = sample.value.wind_avg,
                    wind_min = sample.value.wind_min,
                    wind_max = sample.value.wind_max,
                    "Station sample"
                );
            }
            info!(station = %config.station.id, samples = series.len(), "Station data fetched");
        }
        Commands::WaterLevel { gauge } => {
            let config = run_config.resolve()?;
            let gauge = TideGauge::resolve(&gauge)?;
            let levels = PegelOnlineClient::new(http(&config)?)
                .fetch_water_level(&gauge)
                .await?;

            for sample in levels.samples() {
                info!(time = %sample.time, level_cm = sample.value.level_cm, "Water level");
            }
            info!(gauge = gauge.code, samples = levels.len(), "Water level fetched");
        }
        Commands::SaveForecast {
            locations,
            hours_to_show,
            dir,
        } => {
            let archive = ForecastArchive::new(&dir);
            for location in locations {
                run_config.location = location;
                let config = run_config.resolve()?;
                save_forecast(&config, &archive, hours_to_show).await?;
            }
        }
        Commands::ShowData {
            location,
            model,
            hour_to_show,
            dir,
        } => {
            let archive = ForecastArchive::new(&dir);
            let bucket = Bucket::new(&location, &model, hour_to_show);
            if !archive.exists(&bucket) {
                warn!(bucket = %bucket.file_name(), "Archive bucket does not exist");
                return Ok(());
            }
            let rows = archive.read_all(&bucket)?;
            print_json(&rows)?;
            info!(bucket = %bucket.file_name(), rows = rows.len(), "Archive bucket shown");
        }
        Commands::DropLast {
            location,
            model,
            hour,
            nrows,
            dir,
        } => {
            let archive = ForecastArchive::new(&dir);
            let bucket = Bucket::new(&location, &model, hour);
            let before = archive.read_all(&bucket)?;
            info!(rows = before.len(), "Before");
            let after = archive.drop_last(&bucket, nrows)?;
            print_json(&after)?;
            info!(rows = after.len(), "After");
        }
    }

    Ok(())
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// The shared retrying, caching transport.
fn http(config: &ResolvedConfig) -> Result<Transport<BasicClient>> {
    let t = config.transport;
    Ok(transport(
        BasicClient::new()?,
        t.retries,
        t.backoff_factor,
        t.cache_ttl,
    ))
}

fn station_client(
    config: &ResolvedConfig,
) -> Result<WindguruClient<Transport<StaticHeaders<BasicClient>>>> {
    let t = config.transport;
    let headers = StaticHeaders::browser(
        BasicClient::new()?,
        &windguru::station_page(&config.station.id),
    )?;
    Ok(WindguruClient::new(transport(
        headers,
        t.retries,
        t.backoff_factor,
        t.cache_ttl,
    )))
}

/// Runs one comparison and writes the requested outputs.
#[tracing::instrument(skip_all, fields(location = config.location.code))]
async fn compare(
    config: &ResolvedConfig,
    output: Option<&str>,
    history: Option<&str>,
) -> Result<()> {
    let pipeline = Pipeline::new(
        OpenMeteoClient::new(http(config)?),
        station_client(config)?,
        PegelOnlineClient::new(http(config)?),
    );

    let now = Local::now().fixed_offset();
    let table = pipeline.run(config, now).await?;

    print_pretty(&table);
    print_json(&summaries(&table))?;

    for score in table.scores() {
        info!(
            model = score.model(),
            rmse = score.summary.rmse,
            grade = %score.summary.grade,
            observed_rows = score.summary.observed_rows,
            latest_smoothed = score.latest_smoothed(),
            "Model scored"
        );
    }

    if let Some(path) = output {
        write_table(path, &table)?;
    }
    if let Some(path) = history {
        for score in table.scores() {
            append_record(
                path,
                &ScoreHistoryRecord::new(&now, config.location.code, &score.summary),
            )?;
        }
    }

    Ok(())
}

/// Archives the upcoming forecast of every configured model.
#[tracing::instrument(skip_all, fields(location = config.location.code, hours_to_show = hours_to_show))]
async fn save_forecast(
    config: &ResolvedConfig,
    archive: &ForecastArchive,
    hours_to_show: u32,
) -> Result<()> {
    let window = ForecastWindow::from_hours(0, hours_to_show)?;
    let forecasts = OpenMeteoClient::new(http(config)?)
        .fetch_forecasts(&config.location, &window, &config.models)
        .await?;

    let now = Local::now().naive_local();
    for raw in forecasts {
        let series = ForecastSeries::from_raw(raw)?;
        let outcome = archive.save_forecast(config.location.code, &series, hours_to_show, now)?;
        if outcome.up_to_date {
            info!(model = series.model().0, "No new data");
        }
    }

    Ok(())
}
