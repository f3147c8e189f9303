//! Append-only forecast archive.
//!
//! Forecasts are stored per location, model and forecast horizon hour, one
//! CSV file per bucket: `{location}_{model}_{hour}.csv`. Bucket `h` holds
//! rows that were, when saved, `h` hours ahead of the latest forecast point.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::engine::types::ForecastSeries;
use crate::error::Result;

/// Rows at most this far in the past are still archived.
const PAST_TOLERANCE_MINUTES: i64 = 2;

/// Rows per horizon hour.
const ROWS_PER_BUCKET: usize = 4;

/// One archived forecast point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRow {
    /// Wall-clock time of the forecast point at the location
    pub datetime: NaiveDateTime,
    pub wind_speed_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub save_time: NaiveDateTime,
}

/// Identifies one archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub location: String,
    pub model: String,
    pub hour: u32,
}

impl Bucket {
    pub fn new(location: &str, model: &str, hour: u32) -> Self {
        Self {
            location: location.to_string(),
            model: model.to_string(),
            hour,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.csv", self.location, self.model, self.hour)
    }
}

/// What a single [`ForecastArchive::save_forecast`] call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub buckets_written: usize,
    pub rows_written: usize,
    /// The horizon bucket already held the latest forecast point
    pub up_to_date: bool,
}

#[derive(Debug, Clone)]
pub struct ForecastArchive {
    dir: PathBuf,
}

impl ForecastArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, bucket: &Bucket) -> PathBuf {
        self.dir.join(bucket.file_name())
    }

    pub fn exists(&self, bucket: &Bucket) -> bool {
        self.path(bucket).exists()
    }

    /// Appends `rows`, writing the header only when the file is new or empty.
    pub fn append(&self, bucket: &Bucket, rows: &[ArchiveRow]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(bucket);
        let has_content = fs::metadata(&path).is_ok_and(|m| m.len() > 0);
        debug!(path = %path.display(), has_content, rows = rows.len(), "Appending archive rows");

        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// All rows of a bucket in file order; empty if the bucket does not exist.
    pub fn read_all(&self, bucket: &Bucket) -> Result<Vec<ArchiveRow>> {
        let path = self.path(bucket);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let rows = reader.deserialize().collect::<std::result::Result<Vec<ArchiveRow>, _>>()?;
        Ok(rows)
    }

    /// The latest forecast point stored in a bucket.
    pub fn latest(&self, bucket: &Bucket) -> Result<Option<NaiveDateTime>> {
        Ok(self.read_all(bucket)?.into_iter().map(|r| r.datetime).max())
    }

    /// Removes the last `n` rows of a bucket and returns the rows kept.
    pub fn drop_last(&self, bucket: &Bucket, n: usize) -> Result<Vec<ArchiveRow>> {
        let mut rows = self.read_all(bucket)?;
        rows.truncate(rows.len().saturating_sub(n));

        let path = self.path(bucket);
        if path.exists() {
            let mut writer = csv::Writer::from_path(&path)?;
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        info!(bucket = %bucket.file_name(), remaining = rows.len(), "Dropped trailing rows");

        Ok(rows)
    }

    /// Archives a fresh forecast for `location`, distributing its rows over
    /// the horizon buckets `horizon_hours` down to 1.
    ///
    /// Only rows later than two minutes before `now` that carry a wind speed
    /// are kept. If the horizon bucket does not exist yet, the rows are cut
    /// from the back into one-hour chunks, the last chunk going to the
    /// horizon bucket, the one before it to the bucket below, and so on.
    /// Otherwise each bucket from the horizon down receives the rows newer
    /// than its own latest point; the walk stops at the first bucket that
    /// already holds the latest forecast point.
    #[tracing::instrument(skip_all, fields(location = location, model = series.model().0, horizon = horizon_hours))]
    pub fn save_forecast(
        &self,
        location: &str,
        series: &ForecastSeries,
        horizon_hours: u32,
        now: NaiveDateTime,
    ) -> Result<SaveOutcome> {
        let model = series.model().name()?;
        let save_time = now.with_nanosecond(0).unwrap_or(now);
        let cutoff = now - TimeDelta::minutes(PAST_TOLERANCE_MINUTES);

        let mut rows: Vec<ArchiveRow> = series
            .iter()
            .map(|(t, r)| (t.naive_local(), r))
            .filter(|(t, r)| *t > cutoff && r.wind_speed.is_some())
            .map(|(datetime, r)| ArchiveRow {
                datetime,
                wind_speed_10m: r.wind_speed,
                wind_gusts_10m: r.wind_gusts,
                wind_direction_10m: r.wind_direction,
                apparent_temperature: r.apparent_temperature,
                precipitation: r.precipitation,
                save_time,
            })
            .collect();

        let mut outcome = SaveOutcome::default();
        let mut countdown = horizon_hours;
        if countdown == 0 {
            return Ok(outcome);
        }

        if !self.exists(&Bucket::new(location, model, countdown)) {
            info!("No archive yet, seeding all horizon buckets");
            while !rows.is_empty() {
                let chunk = rows.split_off(rows.len().saturating_sub(ROWS_PER_BUCKET));
                self.append(&Bucket::new(location, model, countdown), &chunk)?;
                outcome.buckets_written += 1;
                outcome.rows_written += chunk.len();
                countdown -= 1;
                if countdown == 0 {
                    break;
                }
            }
            return Ok(outcome);
        }

        let Some(last) = rows.iter().map(|r| r.datetime).max() else {
            info!("No forecast rows to archive");
            return Ok(outcome);
        };

        loop {
            let bucket = Bucket::new(location, model, countdown);
            let previous = self.latest(&bucket)?;
            if previous == Some(last) {
                outcome.up_to_date = countdown == horizon_hours;
                debug!(bucket = %bucket.file_name(), "Bucket already up to date");
                break;
            }

            let (fresh, older): (Vec<ArchiveRow>, Vec<ArchiveRow>) = rows
                .into_iter()
                .partition(|r| previous.is_none_or(|p| r.datetime > p));
            if !fresh.is_empty() {
                self.append(&bucket, &fresh)?;
                outcome.buckets_written += 1;
                outcome.rows_written += fresh.len();
            }
            rows = older;

            countdown -= 1;
            if countdown == 0 || rows.is_empty() {
                break;
            }
        }

        info!(
            buckets = outcome.buckets_written,
            rows = outcome.rows_written,
            "Forecast archived"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::grid::Grid;
    use crate::engine::types::{ForecastRecord, ModelId};
    use chrono::DateTime;
    use std::env;

    fn temp_archive(name: &str) -> ForecastArchive {
        let dir = env::temp_dir().join(format!("wind_rater_archive_{name}"));
        let _ = fs::remove_dir_all(&dir);
        ForecastArchive::new(dir)
    }

    /// `len` quarter-hour rows starting at quarter `first`, UTC offset zero.
    fn forecast(first: i64, len: usize) -> ForecastSeries {
        let start = first * 900;
        let grid = Grid::build(start, start + 900 * len as i64, 900, 0).unwrap();
        let records = (0..len)
            .map(|i| ForecastRecord {
                wind_speed: Some(10.0 + i as f64),
                wind_gusts: Some(15.0),
                ..Default::default()
            })
            .collect();
        ForecastSeries::new(ModelId(23), grid, records).unwrap()
    }

    fn quarter(q: i64) -> NaiveDateTime {
        DateTime::from_timestamp(q * 900, 0).unwrap().naive_utc()
    }

    fn stamps(rows: &[ArchiveRow]) -> Vec<NaiveDateTime> {
        rows.iter().map(|r| r.datetime).collect()
    }

    #[test]
    fn test_first_run_seeds_hour_chunks_from_the_back() {
        let archive = temp_archive("seed");

        let outcome = archive
            .save_forecast("wac", &forecast(0, 10), 3, quarter(0))
            .unwrap();

        assert_eq!(outcome.buckets_written, 3);
        assert_eq!(outcome.rows_written, 10);
        let b3 = archive.read_all(&Bucket::new("wac", "icon_d2", 3)).unwrap();
        let b2 = archive.read_all(&Bucket::new("wac", "icon_d2", 2)).unwrap();
        let b1 = archive.read_all(&Bucket::new("wac", "icon_d2", 1)).unwrap();
        assert_eq!(stamps(&b3), (6..10).map(quarter).collect::<Vec<_>>());
        assert_eq!(stamps(&b2), (2..6).map(quarter).collect::<Vec<_>>());
        assert_eq!(stamps(&b1), (0..2).map(quarter).collect::<Vec<_>>());
        assert_eq!(b3[0].save_time, quarter(0));
    }

    #[test]
    fn test_incremental_run_walks_buckets_down() {
        let archive = temp_archive("incremental");
        archive
            .save_forecast("wac", &forecast(0, 10), 3, quarter(0))
            .unwrap();

        // One hour later the forecast covers quarters 4..14.
        let outcome = archive
            .save_forecast("wac", &forecast(4, 10), 3, quarter(4))
            .unwrap();

        assert_eq!(outcome.rows_written, 10);
        let b3 = archive.read_all(&Bucket::new("wac", "icon_d2", 3)).unwrap();
        let b2 = archive.read_all(&Bucket::new("wac", "icon_d2", 2)).unwrap();
        let b1 = archive.read_all(&Bucket::new("wac", "icon_d2", 1)).unwrap();
        assert_eq!(stamps(&b3[4..]), (10..14).map(quarter).collect::<Vec<_>>());
        assert_eq!(stamps(&b2[4..]), (6..10).map(quarter).collect::<Vec<_>>());
        assert_eq!(stamps(&b1[2..]), vec![quarter(4), quarter(5)]);
        assert_eq!(b3[4].save_time, quarter(4));
    }

    #[test]
    fn test_repeated_run_writes_nothing() {
        let archive = temp_archive("repeat");
        archive
            .save_forecast("wac", &forecast(0, 10), 3, quarter(0))
            .unwrap();

        let outcome = archive
            .save_forecast("wac", &forecast(0, 10), 3, quarter(0))
            .unwrap();

        assert!(outcome.up_to_date);
        assert_eq!(outcome.rows_written, 0);
        assert_eq!(archive.read_all(&Bucket::new("wac", "icon_d2", 3)).unwrap().len(), 4);
    }

    #[test]
    fn test_past_rows_and_missing_speed_are_skipped() {
        let archive = temp_archive("filter");
        let grid = Grid::build(0, 900 * 4, 900, 0).unwrap();
        let records = vec![
            ForecastRecord {
                wind_speed: Some(5.0),
                ..Default::default()
            },
            ForecastRecord {
                wind_speed: Some(6.0),
                ..Default::default()
            },
            ForecastRecord::default(),
            ForecastRecord {
                wind_speed: Some(8.0),
                ..Default::default()
            },
        ];
        let series = ForecastSeries::new(ModelId(11), grid, records).unwrap();

        // now = 00:16 keeps 00:15 (within two minutes) and drops 00:00.
        let now = quarter(1) + TimeDelta::minutes(1);
        archive.save_forecast("fal", &series, 1, now).unwrap();

        let rows = archive
            .read_all(&Bucket::new("fal", "arome_france_hd", 1))
            .unwrap();
        assert_eq!(stamps(&rows), vec![quarter(1), quarter(3)]);
        assert_eq!(rows[1].apparent_temperature, None);
    }

    #[test]
    fn test_drop_last_rewrites_bucket() {
        let archive = temp_archive("drop");
        archive
            .save_forecast("wac", &forecast(0, 4), 1, quarter(0))
            .unwrap();
        let bucket = Bucket::new("wac", "icon_d2", 1);

        let kept = archive.drop_last(&bucket, 3).unwrap();

        assert_eq!(stamps(&kept), vec![quarter(0)]);
        assert_eq!(archive.read_all(&bucket).unwrap(), kept);
        assert_eq!(archive.latest(&bucket).unwrap(), Some(quarter(0)));
    }

    #[test]
    fn test_save_after_dropping_every_row() {
        let archive = temp_archive("drop_all");
        archive
            .save_forecast("wac", &forecast(0, 4), 1, quarter(0))
            .unwrap();
        let bucket = Bucket::new("wac", "icon_d2", 1);

        assert!(archive.drop_last(&bucket, 10).unwrap().is_empty());
        assert!(archive.read_all(&bucket).unwrap().is_empty());

        let outcome = archive
            .save_forecast("wac", &forecast(4, 4), 1, quarter(4))
            .unwrap();

        assert_eq!(outcome.rows_written, 4);
        let rows = archive.read_all(&bucket).unwrap();
        assert_eq!(stamps(&rows), (4..8).map(quarter).collect::<Vec<_>>());
        assert_eq!(archive.latest(&bucket).unwrap(), Some(quarter(7)));
    }

    #[test]
    fn test_missing_bucket_reads_empty() {
        let archive = temp_archive("missing");
        let bucket = Bucket::new("wac", "icon_d2", 36);

        assert!(archive.read_all(&bucket).unwrap().is_empty());
        assert_eq!(archive.latest(&bucket).unwrap(), None);
    }
}
