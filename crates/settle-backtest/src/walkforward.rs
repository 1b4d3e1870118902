// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Walk-forward trainer.
//!
//! For every trading day `d` (a UTC calendar date of the frame) a weighted
//! linear model is fitted on the rows dated `(d - embargo - train_days,
//! d - embargo]` and applied to the rows of `d`, once with the realised
//! feature values and once with their forecast stand-ins. Predictions are
//! averaged per (date, hour) before they are written back.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use serde::Serialize;
use settle_core::{Column, Frame, FrameError};
use settle_types::{FeaturePair, ModelConfig, Target, WeightScheme, columns};
use tracing::{debug, info, warn};

use crate::weighting;
use crate::wls::{self, LinearModel};

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardConfig {
    pub train_days: u32,
    pub embargo_days: u32,
    pub weighting: WeightScheme,
    pub target: Target,
    pub features: Vec<FeaturePair>,
    pub first_day: Option<NaiveDate>,
}

impl WalkForwardConfig {
    #[must_use]
    pub fn from_model(model: &ModelConfig, features: Vec<FeaturePair>) -> Self {
        Self {
            train_days: model.train_days,
            embargo_days: model.embargo_days,
            weighting: model.weighting.with_decay(model.weight_decay),
            target: model.target,
            features,
            first_day: model.first_day,
        }
    }
}

/// Dates whose rows may train the model for one trading day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrainingWindow {
    /// Exclusive lower bound
    pub after: NaiveDate,
    /// Inclusive upper bound
    pub through: NaiveDate,
}

impl TrainingWindow {
    /// `None` when the window would start before the calendar range
    #[must_use]
    pub fn for_day(day: NaiveDate, train_days: u32, embargo_days: u32) -> Option<Self> {
        let through = day.checked_sub_days(Days::new(u64::from(embargo_days)))?;
        let after = through.checked_sub_days(Days::new(u64::from(train_days)))?;
        Some(Self { after, through })
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date > self.after && date <= self.through
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayStatus {
    Predicted { training_rows: usize },
    EmptyWindow,
    FitFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub window: Option<TrainingWindow>,
    pub status: DayStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalkForwardReport {
    pub days: Vec<DayOutcome>,
}

impl WalkForwardReport {
    #[must_use]
    pub fn predicted_days(&self) -> usize {
        self.days
            .iter()
            .filter(|d| matches!(d.status, DayStatus::Predicted { .. }))
            .count()
    }

    #[must_use]
    pub fn skipped_days(&self) -> usize {
        self.days.len() - self.predicted_days()
    }
}

/// Feature columns of the frame, resolved once
struct Design<'a> {
    target: &'a [Option<f64>],
    actual: Vec<&'a [Option<f64>]>,
    forecast: Vec<&'a [Option<f64>]>,
}

impl<'a> Design<'a> {
    fn new(frame: &'a Frame, config: &WalkForwardConfig) -> Result<Self, FrameError> {
        Ok(Self {
            target: frame.require(config.target.column())?,
            actual: config
                .features
                .iter()
                .map(|f| frame.require(&f.actual))
                .collect::<Result<_, _>>()?,
            forecast: config
                .features
                .iter()
                .map(|f| frame.require(&f.forecast))
                .collect::<Result<_, _>>()?,
        })
    }

    fn row(columns: &[&[Option<f64>]], row: usize) -> Option<Vec<f64>> {
        columns.iter().map(|c| c[row]).collect()
    }
}

/// Rows grouped by UTC calendar date, in index order
fn rows_by_date(index: &[DateTime<Utc>]) -> BTreeMap<NaiveDate, Vec<usize>> {
    let mut days: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (row, instant) in index.iter().enumerate() {
        days.entry(instant.date_naive()).or_default().push(row);
    }
    days
}

/// Rows usable for training inside `window`: target and every actual
/// feature present
#[must_use]
pub fn training_rows(
    frame: &Frame,
    window: &TrainingWindow,
    target: &[Option<f64>],
    features: &[&[Option<f64>]],
) -> Vec<usize> {
    frame
        .index()
        .iter()
        .enumerate()
        .filter(|(row, instant)| {
            window.contains(instant.date_naive())
                && target[*row].is_some()
                && features.iter().all(|c| c[*row].is_some())
        })
        .map(|(row, _)| row)
        .collect()
}

fn fit_window(
    design: &Design<'_>,
    rows: &[usize],
    scheme: WeightScheme,
) -> Result<LinearModel, wls::ModelError> {
    let mut x = Vec::with_capacity(rows.len());
    let mut y = Vec::with_capacity(rows.len());
    for &row in rows {
        if let (Some(features), Some(target)) = (Design::row(&design.actual, row), design.target[row])
        {
            x.push(features);
            y.push(target);
        }
    }
    wls::fit_wls(&x, &y, &weighting::weights(scheme, x.len()))
}

/// Mean per (date, hour), assigned to every row of the group
fn hourly_means(index: &[DateTime<Utc>], rows: &[usize], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut groups: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (&row, value) in rows.iter().zip(values) {
        if let Some(v) = value {
            let entry = groups.entry(index[row].hour()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }
    rows.iter()
        .map(|&row| {
            groups
                .get(&index[row].hour())
                .map(|(sum, n)| sum / *n as f64)
        })
        .collect()
}

/// Run the walk-forward loop and return `frame` extended with prediction and
/// coefficient columns.
///
/// Days with an empty training window or a failed fit keep empty predictions.
pub fn run_walk_forward(
    frame: &Frame,
    config: &WalkForwardConfig,
) -> Result<(Frame, WalkForwardReport), FrameError> {
    let design = Design::new(frame, config)?;
    let index = frame.index();
    let n = frame.len();

    let mut prediction_actual: Column = vec![None; n];
    let mut prediction_forecast: Column = vec![None; n];
    let mut coefficients: Vec<Column> = vec![vec![None; n]; config.features.len()];
    let mut intercept: Column = vec![None; n];
    let mut report = WalkForwardReport::default();

    let days = rows_by_date(index);
    for (&date, day_rows) in days.range(config.first_day.unwrap_or(NaiveDate::MIN)..) {
        let Some(window) = TrainingWindow::for_day(date, config.train_days, config.embargo_days)
        else {
            report.days.push(DayOutcome {
                date,
                window: None,
                status: DayStatus::EmptyWindow,
            });
            continue;
        };

        let rows = training_rows(frame, &window, design.target, &design.actual);
        if rows.is_empty() {
            debug!("{}: empty training window {:?}, skipping", date, window);
            report.days.push(DayOutcome {
                date,
                window: Some(window),
                status: DayStatus::EmptyWindow,
            });
            continue;
        }

        let model = match fit_window(&design, &rows, config.weighting) {
            Ok(model) => model,
            Err(e) => {
                warn!("{}: model fit failed: {}", date, e);
                report.days.push(DayOutcome {
                    date,
                    window: Some(window),
                    status: DayStatus::FitFailed {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        let raw_actual: Column = day_rows
            .iter()
            .map(|&row| model.predict(&Design::row(&design.actual, row)?))
            .collect();
        let raw_forecast: Column = day_rows
            .iter()
            .map(|&row| model.predict(&Design::row(&design.forecast, row)?))
            .collect();

        let smoothed_actual = hourly_means(index, day_rows, &raw_actual);
        let smoothed_forecast = hourly_means(index, day_rows, &raw_forecast);

        for (i, &row) in day_rows.iter().enumerate() {
            prediction_actual[row] = smoothed_actual[i];
            prediction_forecast[row] = smoothed_forecast[i];
            intercept[row] = Some(model.intercept);
            for (column, value) in coefficients.iter_mut().zip(&model.coefficients) {
                column[row] = Some(*value);
            }
        }

        report.days.push(DayOutcome {
            date,
            window: Some(window),
            status: DayStatus::Predicted {
                training_rows: rows.len(),
            },
        });
    }

    let mut result = frame.clone();
    result.insert_column(columns::PREDICTION_ACTUAL, prediction_actual)?;
    result.insert_column(columns::PREDICTION_FORECAST, prediction_forecast)?;
    result.insert_column(columns::COEF_CONST, intercept)?;
    for (feature, values) in config.features.iter().zip(coefficients) {
        result.insert_column(columns::coefficient(&feature.actual), values)?;
    }

    info!(
        "Walk-forward: {} days predicted, {} skipped",
        report.predicted_days(),
        report.skipped_days()
    );
    Ok((result, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let window = TrainingWindow::for_day(date("2024-11-20"), 90, 3).unwrap();
        assert_eq!(window.through, date("2024-11-17"));
        assert_eq!(window.after, date("2024-08-19"));
        assert!(window.contains(date("2024-11-17")));
        assert!(!window.contains(date("2024-11-18")));
        assert!(!window.contains(date("2024-08-19")));
        assert!(window.contains(date("2024-08-20")));
    }

    #[test]
    fn test_hourly_means_cover_missing_rows() {
        let start: DateTime<Utc> = "2024-01-01T10:00:00Z".parse().unwrap();
        let index: Vec<DateTime<Utc>> = (0..6).map(|i| start + TimeDelta::minutes(15 * i)).collect();
        let rows: Vec<usize> = (0..6).collect();
        let values = vec![Some(1.0), Some(3.0), None, Some(2.0), None, Some(8.0)];

        let out = hourly_means(&index, &rows, &values);
        assert_eq!(
            out,
            vec![Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(8.0), Some(8.0)]
        );
    }
}
