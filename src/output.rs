//! Output formatting and persistence for comparison runs.
//!
//! Supports pretty-printing, JSON serialization, the combined table as CSV,
//! and appending score history rows.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::combine::CombinedTable;
use crate::engine::reindex::Alignment;
use crate::engine::score::ScoreSummary;
use crate::engine::types::TimePoint;

/// Logs every model's score summary using the debug pretty-print format.
pub fn print_pretty(table: &CombinedTable) {
    for score in table.scores() {
        debug!("{:#?}", score.summary);
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The per-model summaries of a run.
pub fn summaries(table: &CombinedTable) -> Vec<&ScoreSummary> {
    table.scores().iter().map(|s| &s.summary).collect()
}

/// One row of the score history file.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreHistoryRecord {
    pub run_time: String,
    pub location: String,
    pub model: String,
    pub observed_rows: usize,
    pub clipped_sse: f64,
    pub rmse: f64,
    pub grade: String,
}

impl ScoreHistoryRecord {
    pub fn new(run_time: &TimePoint, location: &str, summary: &ScoreSummary) -> Self {
        Self {
            run_time: run_time.to_rfc3339(),
            location: location.to_string(),
            model: summary.model.clone(),
            observed_rows: summary.observed_rows,
            clipped_sse: summary.clipped_sse,
            rmse: summary.rmse,
            grade: summary.grade.clone(),
        }
    }
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &str, record: &T) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_default()
}

fn lag_minutes<T>(entry: &Alignment<T>) -> String {
    entry
        .lag()
        .map(|lag| lag.num_minutes().to_string())
        .unwrap_or_default()
}

/// Column names of [`write_table`], in order.
pub fn table_header(table: &CombinedTable) -> Vec<String> {
    let mut header = vec!["time".to_string()];
    for model in table.models() {
        for column in [
            "wind_speed",
            "wind_gusts",
            "wind_direction",
            "direction_east",
            "direction_north",
            "apparent_temperature",
            "precipitation",
            "squared_error",
            "smoothed_error",
        ] {
            header.push(format!("{}_{column}", model.name));
        }
    }
    header.extend(
        ["wind_avg", "wind_min", "wind_max", "wind_alignment", "wind_lag_min"].map(String::from),
    );
    if table.tide().is_some() {
        header.extend(["water_level_cm", "tide_alignment", "tide_lag_min"].map(String::from));
    }
    header
}

/// Writes the combined table as CSV, one row per grid point. Missing values
/// are written as empty cells.
pub fn write_table(path: &str, table: &CombinedTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(table_header(table))?;

    for (i, time) in table.times().iter().enumerate() {
        let mut row = vec![time.to_rfc3339()];

        for (model, score) in table.models().iter().zip(table.scores()) {
            let r = &model.records[i];
            let direction = model.directions[i];
            let point = &score.points[i];
            row.extend([
                cell(r.wind_speed),
                cell(r.wind_gusts),
                cell(r.wind_direction),
                cell(direction.map(|d| d.east)),
                cell(direction.map(|d| d.north)),
                cell(r.apparent_temperature),
                cell(r.precipitation),
                cell(point.squared_error),
                cell(point.smoothed_error),
            ]);
        }

        let wind = &table.wind().entries()[i];
        let observed = wind.value();
        row.extend([
            cell(observed.map(|w| w.wind_avg)),
            cell(observed.map(|w| w.wind_min)),
            cell(observed.map(|w| w.wind_max)),
            wind.label().to_string(),
            lag_minutes(wind),
        ]);

        if let Some(tide) = table.tide() {
            let level = &tide.entries()[i];
            row.extend([
                cell(level.value().map(|l| l.level_cm)),
                level.label().to_string(),
                lag_minutes(level),
            ]);
        }

        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(path, rows = table.len(), "Combined table written");
    Ok(())
}
