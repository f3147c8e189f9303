//! Repair of zero-gust dropouts in a forecast series.
//!
//! Some models occasionally report a gust of exactly zero in the middle of a
//! windy period. Each such point is replaced, together with its three
//! neighbours on either side, by a linear ramp between the values four steps
//! away.

use tracing::{debug, warn};

use crate::engine::types::ForecastSeries;

/// Distance from a fault center to the anchors of its repair window.
const MARGIN: usize = 4;

/// Indices of exact-zero values far enough from both ends to be repaired.
pub fn fault_centers(gusts: &[Option<f64>]) -> Vec<usize> {
    if gusts.len() <= 2 * MARGIN {
        return Vec::new();
    }
    (MARGIN..gusts.len() - MARGIN)
        .filter(|&i| gusts[i] == Some(0.0))
        .collect()
}

/// Returns a copy of `gusts` with every zero dropout smoothed out.
///
/// Centers are detected on the original values and repaired left to right,
/// with anchors also read from the original values. When two windows
/// overlap, the later repair overwrites the shared points.
pub fn repair_gust_dropouts(gusts: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut repaired = gusts.to_vec();

    for i in fault_centers(gusts) {
        let (Some(a), Some(b)) = (gusts[i - MARGIN], gusts[i + MARGIN]) else {
            warn!(index = i, "Gust dropout without both anchors, left as is");
            continue;
        };

        let center = (a + b) / 2.0;
        let left = (a + center) / 2.0;
        let right = (center + b) / 2.0;

        repaired[i - 3] = Some((a + left) / 2.0);
        repaired[i - 2] = Some(left);
        repaired[i - 1] = Some((left + center) / 2.0);
        repaired[i] = Some(center);
        repaired[i + 1] = Some((center + right) / 2.0);
        repaired[i + 2] = Some(right);
        repaired[i + 3] = Some((right + b) / 2.0);

        debug!(index = i, anchor_left = a, anchor_right = b, "Gust dropout repaired");
    }

    repaired
}

impl ForecastSeries {
    /// Consumes the series and returns it with gust dropouts repaired.
    pub fn with_gusts_repaired(self) -> Self {
        let gusts = repair_gust_dropouts(&self.wind_gusts());
        self.with_gusts(gusts)
    }
}
