//! Per-model forecast error against observed average wind.

use serde::Serialize;

use crate::engine::grade::grade;
use crate::engine::utility::{mean, rolling_mean};

/// Squared error and its trailing mean at one grid point.
///
/// Both are `None` where the point lacks a forecast or ground truth, so
/// future rows never carry a smoothed error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoredPoint {
    pub squared_error: Option<f64>,
    pub smoothed_error: Option<f64>,
}

/// Whole-run summary for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub model: String,
    /// Grid points with both a forecast and ground truth
    pub observed_rows: usize,
    /// Sum of squared errors, each term clipped before summation
    pub clipped_sse: f64,
    pub mean_squared_error: f64,
    pub rmse: f64,
    pub grade: String,
}

/// Scored grid points for one model plus the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSeries {
    pub points: Vec<ScoredPoint>,
    pub summary: ScoreSummary,
}

impl ScoredSeries {
    pub fn model(&self) -> &str {
        &self.summary.model
    }

    /// The most recent smoothed error, if any grid point has one.
    pub fn latest_smoothed(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|p| p.smoothed_error)
    }
}

/// Scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorScorer {
    /// Trailing window of the smoothed error, in grid points
    pub window: usize,
    /// Upper bound of each squared error term in the aggregate
    pub clip: f64,
}

impl Default for ErrorScorer {
    fn default() -> Self {
        Self {
            window: 10,
            clip: 20.0,
        }
    }
}

impl ErrorScorer {
    /// Scores `forecast` wind speeds against `observed` average wind, both
    /// positioned on the same grid.
    ///
    /// Points where either side is missing carry no squared error and do not
    /// count towards the rolling mean or the aggregate.
    pub fn score(
        &self,
        model: &str,
        forecast: &[Option<f64>],
        observed: &[Option<f64>],
    ) -> ScoredSeries {
        let squared: Vec<Option<f64>> = forecast
            .iter()
            .zip(observed)
            .map(|(f, o)| match (f, o) {
                (Some(f), Some(o)) => Some((f - o).powi(2)),
                _ => None,
            })
            .collect();

        let smoothed = rolling_mean(&squared, self.window);
        let points = squared
            .iter()
            .zip(smoothed)
            .map(|(&squared_error, smoothed)| ScoredPoint {
                squared_error,
                smoothed_error: squared_error.and(smoothed),
            })
            .collect();

        let present: Vec<f64> = squared.iter().flatten().copied().collect();
        let clipped_sse = present.iter().map(|e| e.min(self.clip)).sum::<f64>();
        let mean_squared_error = mean(&present);
        let rmse = mean_squared_error.sqrt();

        ScoredSeries {
            points,
            summary: ScoreSummary {
                model: model.to_string(),
                observed_rows: present.len(),
                clipped_sse,
                mean_squared_error,
                rmse,
                grade: if present.is_empty() {
                    "-".into()
                } else {
                    grade(rmse)
                },
            },
        }
    }
}
