//! Canonical quarter-hour timeline.

use chrono::{DateTime, FixedOffset};

use crate::engine::types::TimePoint;
use crate::error::{RaterError, Result};

/// Strictly increasing TimePoints spaced exactly [`Grid::INTERVAL_SECS`]
/// apart, covering `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    points: Vec<TimePoint>,
}

impl Grid {
    /// Spacing fixed by the ingestion contract.
    pub const INTERVAL_SECS: i64 = 900;

    /// Builds the grid for a model's reported window.
    ///
    /// `start` and `end` are UTC seconds; points are expressed with the
    /// model's `utc_offset_secs` so they read as local wall-clock time.
    /// `end <= start` yields an empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::UnsupportedInterval`] for any interval other
    /// than 15 minutes, and a configuration error for an offset outside
    /// ±24h.
    pub fn build(start: i64, end: i64, interval: i64, utc_offset_secs: i32) -> Result<Self> {
        if interval != Self::INTERVAL_SECS {
            return Err(RaterError::UnsupportedInterval(interval));
        }
        let offset = FixedOffset::east_opt(utc_offset_secs)
            .ok_or_else(|| RaterError::Config(format!("invalid UTC offset {utc_offset_secs}s")))?;

        let mut points = Vec::new();
        let mut t = start;
        while t < end {
            let utc = DateTime::from_timestamp(t, 0)
                .ok_or_else(|| RaterError::Config(format!("timestamp {t} out of range")))?;
            points.push(utc.with_timezone(&offset));
            t += interval;
        }

        Ok(Self { points })
    }

    /// The union timeline of several grids.
    ///
    /// Empty grids are ignored. The result starts at the earliest first point,
    /// ends at the latest last point and uses the offset of the first
    /// non-empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::GridMismatch`] if a grid is not on the same
    /// 15-minute phase as the others, since it could only be joined by
    /// shifting its rows.
    pub fn span<'a>(grids: impl IntoIterator<Item = &'a Grid>) -> Result<Self> {
        let non_empty: Vec<&Grid> = grids.into_iter().filter(|g| !g.is_empty()).collect();
        let Some(reference) = non_empty.first() else {
            return Ok(Self::default());
        };

        let anchor = reference.points[0];
        let mut first = anchor;
        let mut last = anchor;
        for grid in &non_empty {
            let (Some(f), Some(l)) = (grid.first(), grid.last()) else {
                continue;
            };
            if (f.timestamp() - anchor.timestamp()).rem_euclid(Self::INTERVAL_SECS) != 0 {
                return Err(RaterError::grid_mismatch(
                    format!("grid starting {}", f.to_rfc3339()),
                    "not on the 15-minute phase of the run grid",
                ));
            }
            first = first.min(*f);
            last = last.max(*l);
        }

        Self::build(
            first.timestamp(),
            last.timestamp() + Self::INTERVAL_SECS,
            Self::INTERVAL_SECS,
            anchor.offset().local_minus_utc(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&TimePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    /// Index of `t` on this grid, if it is exactly one of the points.
    pub fn position(&self, t: &TimePoint) -> Option<usize> {
        let first = self.first()?;
        let delta = t.timestamp() - first.timestamp();
        if delta < 0 || delta % Self::INTERVAL_SECS != 0 {
            return None;
        }
        let index = (delta / Self::INTERVAL_SECS) as usize;
        (index < self.len()).then_some(index)
    }
}
