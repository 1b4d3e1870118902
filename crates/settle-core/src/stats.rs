// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Rolling-window statistics over frame columns.

use chrono::{DateTime, TimeDelta, Utc};

use crate::frame::Column;

/// Quantile of sorted data with linear interpolation between order statistics
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(last);
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn insert_sorted(sorted: &mut Vec<f64>, value: f64) {
    let at = sorted.partition_point(|x| *x < value);
    sorted.insert(at, value);
}

fn remove_sorted(sorted: &mut Vec<f64>, value: f64) {
    let at = sorted.partition_point(|x| *x < value);
    if sorted.get(at).is_some_and(|x| *x == value) {
        sorted.remove(at);
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Quantile over the trailing `window` rows, including the current row.
///
/// A result is produced only when all `window` rows hold a value.
#[must_use]
pub fn rolling_quantile(values: &[Option<f64>], window: usize, q: f64) -> Column {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    let mut sorted: Vec<f64> = Vec::with_capacity(window);
    let mut missing = 0_usize;

    for (i, value) in values.iter().enumerate() {
        match finite(*value) {
            Some(v) => insert_sorted(&mut sorted, v),
            None => missing += 1,
        }
        if i >= window {
            match finite(values[i - window]) {
                Some(v) => remove_sorted(&mut sorted, v),
                None => missing -= 1,
            }
        }
        if i + 1 >= window && missing == 0 {
            out[i] = quantile_sorted(&sorted, q);
        }
    }
    out
}

/// Quantile over the values with instants in `(t - span, t]`.
///
/// Missing values are skipped; a result is produced whenever the window
/// holds at least one value.
#[must_use]
pub fn rolling_quantile_by_time(
    index: &[DateTime<Utc>],
    values: &[Option<f64>],
    span: TimeDelta,
    q: f64,
) -> Column {
    let mut out = Vec::with_capacity(values.len());
    let mut sorted: Vec<f64> = Vec::new();
    let mut tail = 0;

    for (i, instant) in index.iter().enumerate() {
        if let Some(v) = finite(values[i]) {
            insert_sorted(&mut sorted, v);
        }
        while tail <= i && index[tail] <= *instant - span {
            if let Some(v) = finite(values[tail]) {
                remove_sorted(&mut sorted, v);
            }
            tail += 1;
        }
        out.push(quantile_sorted(&sorted, q));
    }
    out
}

/// Move values `periods` rows later; the first rows become empty
#[must_use]
pub fn shift(values: &[Option<f64>], periods: usize) -> Column {
    (0..values.len())
        .map(|i| i.checked_sub(periods).and_then(|src| values[src]))
        .collect()
}

#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation over the rows where both columns hold a value
#[must_use]
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    let denominator = (var_x * var_y).sqrt();
    (denominator > 0.0).then(|| cov / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((quantile_sorted(&sorted, 0.9).unwrap() - 4.6).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 0.1).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_rolling_quantile_needs_full_window() {
        let values = [Some(1.0), Some(3.0), Some(2.0), None, Some(5.0), Some(6.0), Some(7.0)];
        let out = rolling_quantile(&values, 3, 0.5);
        assert_eq!(
            out,
            vec![None, None, Some(2.0), None, None, None, Some(6.0)]
        );
    }

    #[test]
    fn test_rolling_quantile_matches_naive_computation() {
        let values: Vec<Option<f64>> = (0..200)
            .map(|i| Some(f64::from((i * 37) % 101) - 50.0))
            .collect();
        let window = 17;
        let fast = rolling_quantile(&values, window, 0.9);

        for i in window - 1..values.len() {
            let mut slice: Vec<f64> = values[i + 1 - window..=i].iter().flatten().copied().collect();
            slice.sort_by(f64::total_cmp);
            assert_eq!(fast[i], quantile_sorted(&slice, 0.9), "row {i}");
        }
    }

    #[test]
    fn test_rolling_by_time_excludes_window_start() {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let index: Vec<DateTime<Utc>> = (0..4).map(|h| start + TimeDelta::hours(h)).collect();
        let values = [Some(10.0), Some(20.0), None, Some(40.0)];
        let out = rolling_quantile_by_time(&index, &values, TimeDelta::hours(2), 1.0);
        assert_eq!(out, vec![Some(10.0), Some(20.0), Some(20.0), Some(40.0)]);
    }

    #[test]
    fn test_shift() {
        assert_eq!(
            shift(&[Some(1.0), Some(2.0), Some(3.0)], 2),
            vec![None, None, Some(1.0)]
        );
    }

    #[test]
    fn test_pearson() {
        let xs = [Some(1.0), Some(2.0), Some(3.0), None];
        let ys = [Some(2.0), Some(4.0), Some(6.0), Some(1.0)];
        assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[Some(1.0), Some(1.0)], &[Some(1.0), Some(2.0)]), None);
    }
}
