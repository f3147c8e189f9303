//! Bounded nearest-predecessor alignment of observations onto a grid.
//!
//! Each grid point takes the observation sampled exactly at that instant, or
//! else the latest earlier sample when it is recent enough. Grid points in
//! the future never receive a value, and neither does a point whose only
//! candidate is older than the staleness bound.

use chrono::TimeDelta;
use tracing::debug;

use crate::engine::grid::Grid;
use crate::engine::types::{ObservationSeries, TimePoint};

/// Parameters of a single alignment pass.
#[derive(Debug, Clone, Copy)]
pub struct ReindexPolicy {
    /// Maximum age of a predecessor sample used to fill a grid point.
    pub staleness_bound: TimeDelta,
    /// The run's current time; later grid points are pending.
    pub now: TimePoint,
}

impl ReindexPolicy {
    pub fn new(staleness_bound: TimeDelta, now: TimePoint) -> Self {
        Self {
            staleness_bound,
            now,
        }
    }
}

/// Outcome of aligning one grid point.
#[derive(Debug, Clone, PartialEq)]
pub enum Alignment<T> {
    /// A sample exists exactly at the grid point.
    Exact(T),
    /// Filled from the latest earlier sample, `lag` before the grid point.
    Filled { value: T, lag: TimeDelta },
    /// The grid point lies after the run's current time.
    Pending,
    /// No sample precedes the grid point.
    NoPredecessor,
    /// The latest earlier sample is older than the staleness bound.
    Stale { lag: TimeDelta },
}

impl<T> Alignment<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Alignment::Exact(value) | Alignment::Filled { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value().is_some()
    }

    /// Short lowercase name of the variant.
    pub fn label(&self) -> &'static str {
        match self {
            Alignment::Exact(_) => "exact",
            Alignment::Filled { .. } => "filled",
            Alignment::Pending => "pending",
            Alignment::NoPredecessor => "no_predecessor",
            Alignment::Stale { .. } => "stale",
        }
    }

    /// Age of the sample used for this point; zero for exact matches.
    pub fn lag(&self) -> Option<TimeDelta> {
        match self {
            Alignment::Exact(_) => Some(TimeDelta::zero()),
            Alignment::Filled { lag, .. } => Some(*lag),
            _ => None,
        }
    }
}

/// An observation stream resampled onto a grid, one entry per grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedObservation<T> {
    grid: Grid,
    entries: Vec<Alignment<T>>,
}

impl<T: Clone> AlignedObservation<T> {
    /// A stream with no ground truth anywhere on `grid`.
    pub fn empty(grid: &Grid) -> Self {
        Self {
            grid: grid.clone(),
            entries: vec![Alignment::NoPredecessor; grid.len()],
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn entries(&self) -> &[Alignment<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Present values projected through `f`, `None` where there is no value.
    pub fn values<F: Fn(&T) -> f64>(&self, f: F) -> Vec<Option<f64>> {
        self.entries.iter().map(|e| e.value().map(&f)).collect()
    }

    pub fn count_with_value(&self) -> usize {
        self.entries.iter().filter(|e| e.has_value()).count()
    }

    /// Projects this stream onto `grid` by exact lookup.
    ///
    /// Entries are carried over unchanged for grid points this stream
    /// already covers; other points get [`Alignment::NoPredecessor`]. No
    /// predecessor search happens here, so realigning onto the same grid
    /// returns an identical stream.
    ///
    /// Feeding the valued points of an aligned stream back through
    /// [`reindex`] is not idempotent: each filled value becomes a sample on
    /// the grid, so a `Filled` point turns `Exact` and the next point, if it
    /// was `Stale`, can turn `Filled` under the inclusive staleness bound.
    pub fn realign(&self, grid: &Grid) -> Self {
        let entries = grid
            .points()
            .iter()
            .map(|t| match self.grid.position(t) {
                Some(i) => self.entries[i].clone(),
                None => Alignment::NoPredecessor,
            })
            .collect();

        Self {
            grid: grid.clone(),
            entries,
        }
    }
}

/// Aligns `series` onto `grid`.
///
/// A stale predecessor is never copied into the output: the
/// [`Alignment::Stale`] variant records only the lag.
pub fn reindex<T: Clone>(
    series: &ObservationSeries<T>,
    grid: &Grid,
    policy: &ReindexPolicy,
) -> AlignedObservation<T> {
    let samples = series.samples();

    let entries: Vec<Alignment<T>> = grid
        .points()
        .iter()
        .map(|t| {
            // Samples at or before t; the last one is the candidate.
            let upto = samples.partition_point(|s| s.time <= *t);
            let Some(candidate) = upto.checked_sub(1).map(|i| &samples[i]) else {
                return Alignment::NoPredecessor;
            };

            if candidate.time == *t {
                return Alignment::Exact(candidate.value.clone());
            }
            if *t > policy.now {
                return Alignment::Pending;
            }

            let lag = *t - candidate.time;
            if lag > policy.staleness_bound {
                Alignment::Stale { lag }
            } else {
                Alignment::Filled {
                    value: candidate.value.clone(),
                    lag,
                }
            }
        })
        .collect();

    log_alignment(&entries);

    AlignedObservation {
        grid: grid.clone(),
        entries,
    }
}

fn log_alignment<T>(entries: &[Alignment<T>]) {
    let (mut exact, mut filled, mut pending, mut missing, mut stale) = (0, 0, 0, 0, 0);
    let mut max_lag = TimeDelta::zero();

    for entry in entries {
        match entry {
            Alignment::Exact(_) => exact += 1,
            Alignment::Filled { lag, .. } => {
                filled += 1;
                max_lag = max_lag.max(*lag);
            }
            Alignment::Pending => pending += 1,
            Alignment::NoPredecessor => missing += 1,
            Alignment::Stale { .. } => stale += 1,
        }
    }

    debug!(
        exact,
        filled,
        pending,
        no_predecessor = missing,
        stale,
        max_fill_lag_secs = max_lag.num_seconds(),
        "Observations aligned"
    );
}
