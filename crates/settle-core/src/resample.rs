// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Frequency alignment helpers for hourly and quarter-hourly columns.

use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::frame::Column;

fn hour_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::hours(1))
        .unwrap_or(instant)
}

/// Carry the last value forward for the rest of its UTC hour
#[must_use]
pub fn fill_forward_within_hour(index: &[DateTime<Utc>], values: &[Option<f64>]) -> Column {
    let mut out = Vec::with_capacity(values.len());
    let mut held: Option<(DateTime<Utc>, f64)> = None;

    for (instant, value) in index.iter().zip(values) {
        let hour = hour_start(*instant);
        match value {
            Some(v) => {
                held = Some((hour, *v));
                out.push(Some(*v));
            }
            None => out.push(held.filter(|(h, _)| *h == hour).map(|(_, v)| v)),
        }
    }
    out
}

/// Carry the last value forward without limit
#[must_use]
pub fn fill_forward(values: &[Option<f64>]) -> Column {
    let mut held = None;
    values
        .iter()
        .map(|value| {
            if value.is_some() {
                held = *value;
            }
            held
        })
        .collect()
}

/// Two-horizon blend of an hourly forecast:
/// `weight * v(t) + (1 - weight) * v(t + 1h)`.
///
/// Rows without a value one hour later stay empty.
#[must_use]
pub fn blend_next_hour(index: &[DateTime<Utc>], values: &[Option<f64>], weight: f64) -> Column {
    let lookup: BTreeMap<DateTime<Utc>, f64> = index
        .iter()
        .zip(values)
        .filter_map(|(t, v)| v.map(|v| (*t, v)))
        .collect();

    index
        .iter()
        .zip(values)
        .map(|(t, v)| {
            let now = (*v)?;
            let next = lookup.get(&(*t + TimeDelta::hours(1)))?;
            Some(weight * now + (1.0 - weight) * next)
        })
        .collect()
}

/// Linear interpolation weighted by elapsed time between known points.
///
/// Gaps after the last known value hold that value; gaps before the first
/// known value stay empty.
#[must_use]
pub fn interpolate_by_index(index: &[DateTime<Utc>], values: &[Option<f64>]) -> Column {
    let mut out: Column = values.to_vec();
    let mut previous: Option<usize> = None;

    for row in 0..values.len() {
        if values[row].is_none() {
            continue;
        }
        if let Some(left) = previous {
            if row > left + 1 {
                let (Some(v0), Some(v1)) = (values[left], values[row]) else {
                    continue;
                };
                let span = (index[row] - index[left]).num_seconds() as f64;
                for (gap, slot) in out.iter_mut().enumerate().take(row).skip(left + 1) {
                    let elapsed = (index[gap] - index[left]).num_seconds() as f64;
                    *slot = Some(v0 + (v1 - v0) * elapsed / span);
                }
            }
        }
        previous = Some(row);
    }

    if let Some(last) = previous {
        let held = values[last];
        for slot in out.iter_mut().skip(last + 1) {
            *slot = held;
        }
    }
    out
}

/// Spread hourly points over the four quarter-hours of their hour
#[must_use]
pub fn expand_hourly_to_quarter_hour(points: &[(DateTime<Utc>, f64)]) -> Vec<(DateTime<Utc>, f64)> {
    let step = TimeDelta::minutes(15);
    let mut out = Vec::with_capacity(points.len() * 4);

    for (i, (start, value)) in points.iter().enumerate() {
        let hour_end = *start + TimeDelta::hours(1);
        let limit = points
            .get(i + 1)
            .map_or(hour_end, |(next, _)| (*next).min(hour_end));
        let mut current = *start;
        while current < limit {
            out.push((current, *value));
            current += step;
        }
    }
    out
}

/// Mean of the values falling into each UTC hour
#[must_use]
pub fn hourly_mean(points: &[(DateTime<Utc>, f64)]) -> Vec<(DateTime<Utc>, f64)> {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for (instant, value) in points {
        let entry = buckets.entry(hour_start(*instant)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(hour, (sum, n))| (hour, sum / n as f64))
        .collect()
}
