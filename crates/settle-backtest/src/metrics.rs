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

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use settle_core::{Frame, FrameError};
use settle_types::columns;

/// Days averaged by the rolling daily RMSE
pub const ROLLING_RMSE_DAYS: usize = 14;

/// Trading statistics of one prediction track
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackMetrics {
    /// Rows with a model profit
    pub trades: usize,
    pub wins: usize,
    /// Share of trades with a strictly positive model profit
    pub win_rate: f64,
    pub total_pnl: f64,
    pub pnl_per_trade: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Deepest fall of cumulative P&L below its running maximum.
    /// Never positive.
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyError {
    pub date: NaiveDate,
    pub rmse_actual: Option<f64>,
    pub rmse_forecast: Option<f64>,
    pub rolling_rmse_actual: Option<f64>,
    pub rolling_rmse_forecast: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub actual: TrackMetrics,
    pub forecast: TrackMetrics,
    pub daily: Vec<DailyError>,
}

/// Statistics over the rows where `model_profit` is present
#[must_use]
pub fn track_metrics(model_profit: &[Option<f64>], error: &[Option<f64>]) -> TrackMetrics {
    let mut metrics = TrackMetrics::default();
    let mut cumulative = 0.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut abs_error = 0.0;
    let mut sq_error = 0.0;
    let mut error_count = 0_usize;

    for (profit, err) in model_profit.iter().zip(error) {
        let Some(profit) = profit else {
            continue;
        };
        metrics.trades += 1;
        if *profit > 0.0 {
            metrics.wins += 1;
        }
        metrics.total_pnl += profit;

        cumulative += profit;
        peak = peak.max(cumulative);
        metrics.max_drawdown = metrics.max_drawdown.min(cumulative - peak);

        if let Some(e) = err {
            abs_error += e.abs();
            sq_error += e * e;
            error_count += 1;
        }
    }

    if metrics.trades > 0 {
        let trades = metrics.trades as f64;
        metrics.win_rate = metrics.wins as f64 / trades;
        metrics.pnl_per_trade = metrics.total_pnl / trades;
    }
    if error_count > 0 {
        let n = error_count as f64;
        metrics.mae = abs_error / n;
        metrics.rmse = (sq_error / n).sqrt();
    }
    metrics
}

fn daily_rmse(
    frame: &Frame,
    model_profit: &[Option<f64>],
    error: &[Option<f64>],
) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (row, instant) in frame.index().iter().enumerate() {
        if let (Some(_), Some(e)) = (model_profit[row], error[row]) {
            let entry = sums.entry(instant.date_naive()).or_insert((0.0, 0));
            entry.0 += e * e;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (sum, n))| (date, (sum / n as f64).sqrt()))
        .collect()
}

/// Trailing mean over `window` consecutive values, present only when every
/// value in the window is
fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|end| {
            let start = (end + 1).checked_sub(window)?;
            let slice: Option<Vec<f64>> = values[start..=end].iter().copied().collect();
            slice.map(|v| v.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Daily RMSE of both tracks over every calendar day from the first to the
/// last traded day
fn daily_errors(frame: &Frame, tracks: [(&[Option<f64>], &[Option<f64>]); 2]) -> Vec<DailyError> {
    let [actual, forecast] = tracks.map(|(profit, error)| daily_rmse(frame, profit, error));

    let first = actual.keys().chain(forecast.keys()).min().copied();
    let last = actual.keys().chain(forecast.keys()).max().copied();
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let dates: Vec<NaiveDate> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .collect();
    let rmse_actual: Vec<Option<f64>> = dates.iter().map(|d| actual.get(d).copied()).collect();
    let rmse_forecast: Vec<Option<f64>> = dates.iter().map(|d| forecast.get(d).copied()).collect();
    let rolling_actual = rolling_mean(&rmse_actual, ROLLING_RMSE_DAYS);
    let rolling_forecast = rolling_mean(&rmse_forecast, ROLLING_RMSE_DAYS);

    dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| DailyError {
            date,
            rmse_actual: rmse_actual[i],
            rmse_forecast: rmse_forecast[i],
            rolling_rmse_actual: rolling_actual[i],
            rolling_rmse_forecast: rolling_forecast[i],
        })
        .collect()
}

/// Evaluate both prediction tracks of a frame carrying trading columns
pub fn evaluate(frame: &Frame) -> Result<EvaluationReport, FrameError> {
    let profit_actual = frame.require(columns::MODEL_PROFIT_ACTUAL)?;
    let error_actual = frame.require(columns::ERROR_ACTUAL)?;
    let profit_forecast = frame.require(columns::MODEL_PROFIT_FORECAST)?;
    let error_forecast = frame.require(columns::ERROR_FORECAST)?;

    Ok(EvaluationReport {
        actual: track_metrics(profit_actual, error_actual),
        forecast: track_metrics(profit_forecast, error_forecast),
        daily: daily_errors(
            frame,
            [(profit_actual, error_actual), (profit_forecast, error_forecast)],
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    #[test]
    fn test_track_metrics() {
        let profit = vec![Some(2.0), None, Some(-3.0), Some(1.0), Some(-1.0), Some(4.0)];
        let error = vec![Some(1.0), Some(100.0), Some(-2.0), None, Some(2.0), Some(-1.0)];

        let m = track_metrics(&profit, &error);
        assert_eq!(m.trades, 5);
        assert_eq!(m.wins, 3);
        assert!((m.win_rate - 0.6).abs() < 1e-12);
        assert!((m.total_pnl - 3.0).abs() < 1e-12);
        assert!((m.pnl_per_trade - 0.6).abs() < 1e-12);
        // errors of traded rows: 1, -2, 2, -1
        assert!((m.mae - 1.5).abs() < 1e-12);
        assert!((m.rmse - 2.5_f64.sqrt()).abs() < 1e-12);
        // cumulative 2, -1, 0, -1, 3 against peak 2
        assert!((m.max_drawdown - -3.0).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_is_zero_when_pnl_only_rises() {
        let profit = vec![Some(1.0), Some(2.0), Some(0.5)];
        let m = track_metrics(&profit, &[None, None, None]);
        assert!(m.max_drawdown.abs() < f64::EPSILON);
        assert!(m.rmse.abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_track() {
        let m = track_metrics(&[None, None], &[Some(1.0), Some(2.0)]);
        assert_eq!(m, TrackMetrics::default());
    }

    #[test]
    fn test_rolling_mean_needs_full_window() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(7.0)];
        assert_eq!(
            rolling_mean(&values, 2),
            vec![None, Some(1.5), Some(2.5), None, None, Some(6.0)]
        );
    }

    #[test]
    fn test_evaluate_daily_errors_span_gaps() {
        let start: DateTime<Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
        let index = vec![start, start + TimeDelta::days(2)];
        let mut frame = Frame::with_index(index).unwrap();
        for name in [columns::MODEL_PROFIT_ACTUAL, columns::MODEL_PROFIT_FORECAST] {
            frame.insert_column(name, vec![Some(1.0), Some(-1.0)]).unwrap();
        }
        frame
            .insert_column(columns::ERROR_ACTUAL, vec![Some(3.0), Some(-4.0)])
            .unwrap();
        frame
            .insert_column(columns::ERROR_FORECAST, vec![Some(1.0), Some(2.0)])
            .unwrap();

        let report = evaluate(&frame).unwrap();
        assert_eq!(report.daily.len(), 3);
        assert_eq!(report.daily[0].rmse_actual, Some(3.0));
        assert_eq!(report.daily[1].rmse_actual, None);
        assert_eq!(report.daily[2].rmse_forecast, Some(2.0));
        assert!(report.daily.iter().all(|d| d.rolling_rmse_actual.is_none()));
        assert!((report.actual.max_drawdown - -1.0).abs() < 1e-12);
    }
}
