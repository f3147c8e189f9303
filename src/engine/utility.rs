/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Trailing rolling mean over `window` positions, skipping missing values.
///
/// Position `i` averages the present values among `i + 1 - window ..= i`
/// and is `None` when that range holds none.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            (!present.is_empty()).then(|| mean(&present))
        })
        .collect()
}

/// Trailing rolling extremum over exactly `window` samples.
///
/// The first `window - 1` positions have no full window and yield `None`.
pub fn rolling_fold(values: &[f64], window: usize, f: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            (i + 1 >= window).then(|| {
                values[i + 1 - window..=i]
                    .iter()
                    .copied()
                    .reduce(f)
                    .unwrap_or(f64::NAN)
            })
        })
        .collect()
}

/// Full-window trailing mean, the counterpart of [`rolling_fold`].
pub fn rolling_full_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| (i + 1 >= window).then(|| mean(&values[i + 1 - window..=i])))
        .collect()
}
