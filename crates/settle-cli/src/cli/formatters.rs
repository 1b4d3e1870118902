// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Output formatters for stage results.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL};
use serde::Serialize;
use settle_backtest::{DayStatus, EvaluationReport, TrackMetrics, WalkForwardReport};
use settle_core::features::TuningCell;
use settle_core::{DatasetReport, ForecastValidation, MergeReport};

/// Formatter for pretty terminal tables
#[derive(Debug)]
pub struct TableFormatter;

/// Formatter for machine-readable report files
#[derive(Debug)]
pub struct JsonFormatter;

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(names: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header(names));
    table
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.precision$}"))
}

impl TableFormatter {
    #[must_use]
    pub fn datasets(reports: &[DatasetReport]) -> String {
        let mut table = new_table(&[
            "Source",
            "Dataset",
            "Rows",
            "Observations",
            "Skipped rows",
            "Skipped cells",
        ]);
        for r in reports {
            let skipped = r.skipped.total_rows();
            let skipped_cell = if skipped > 0 {
                Cell::new(skipped).fg(Color::Yellow)
            } else {
                Cell::new(skipped)
            };
            table.add_row(vec![
                Cell::new(r.source.as_str()),
                Cell::new(&r.dataset),
                Cell::new(r.rows),
                Cell::new(r.observations),
                skipped_cell,
                Cell::new(r.skipped.empty_values + r.skipped.bad_values),
            ]);
        }
        table.to_string()
    }

    #[must_use]
    pub fn merge(reports: &[MergeReport]) -> String {
        let mut table = new_table(&["Series", "Candidates", "Eligible", "Resolved"]);
        for r in reports {
            let resolved = if r.resolved == 0 {
                Cell::new(r.resolved).fg(Color::Red)
            } else {
                Cell::new(r.resolved)
            };
            table.add_row(vec![
                Cell::new(&r.series),
                Cell::new(r.candidates),
                Cell::new(r.eligible),
                resolved,
            ]);
        }
        table.to_string()
    }

    #[must_use]
    pub fn walk_forward(report: &WalkForwardReport) -> String {
        let mut output = format!(
            "Walk-forward: {} trading days, {} predicted, {} skipped\n",
            report.days.len(),
            report.predicted_days(),
            report.skipped_days()
        );
        let failures: Vec<_> = report
            .days
            .iter()
            .filter_map(|d| match &d.status {
                DayStatus::FitFailed { reason } => Some((d.date, reason)),
                DayStatus::Predicted { .. } | DayStatus::EmptyWindow => None,
            })
            .collect();
        if !failures.is_empty() {
            let mut table = new_table(&["Date", "Fit failure"]);
            for (date, reason) in failures {
                table.add_row(vec![
                    Cell::new(date),
                    Cell::new(reason).fg(Color::Red),
                ]);
            }
            output.push_str(&table.to_string());
            output.push('\n');
        }
        output
    }

    #[must_use]
    pub fn evaluation(report: &EvaluationReport, daily: bool) -> String {
        let mut table = new_table(&[
            "Track",
            "Trades",
            "Win rate",
            "Total PnL",
            "PnL / trade",
            "MAE",
            "RMSE",
            "Max drawdown",
        ]);
        for (name, m) in [("Actuals", &report.actual), ("Forecast", &report.forecast)] {
            table.add_row(Self::track_row(name, m));
        }
        let mut output = table.to_string();
        output.push('\n');

        if daily {
            let mut table = new_table(&[
                "Date",
                "RMSE actual",
                "RMSE forecast",
                "14d actual",
                "14d forecast",
            ]);
            for d in &report.daily {
                table.add_row(vec![
                    Cell::new(d.date),
                    Cell::new(opt(d.rmse_actual, 2)),
                    Cell::new(opt(d.rmse_forecast, 2)),
                    Cell::new(opt(d.rolling_rmse_actual, 2)),
                    Cell::new(opt(d.rolling_rmse_forecast, 2)),
                ]);
            }
            output.push_str(&table.to_string());
            output.push('\n');
        }
        output
    }

    fn track_row(name: &str, m: &TrackMetrics) -> Vec<Cell> {
        let total = if m.total_pnl >= 0.0 {
            Cell::new(format!("{:.2}", m.total_pnl)).fg(Color::Green)
        } else {
            Cell::new(format!("{:.2}", m.total_pnl)).fg(Color::Red)
        };
        vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(m.trades),
            Cell::new(format!("{:.2}%", m.win_rate * 100.0)),
            total,
            Cell::new(format!("{:.2}", m.pnl_per_trade)),
            Cell::new(format!("{:.2}", m.mae)),
            Cell::new(format!("{:.2}", m.rmse)),
            Cell::new(format!("{:.2}", m.max_drawdown)),
        ]
    }

    #[must_use]
    pub fn validation(results: &[ForecastValidation]) -> String {
        let mut table = new_table(&[
            "Forecast",
            "Actual",
            "Rows",
            "MAE",
            "RMSE",
            "Rel. MAE",
            "Bias",
            "Bias %",
            "Correlation",
        ]);
        for v in results {
            table.add_row(vec![
                Cell::new(&v.forecast),
                Cell::new(&v.actual),
                Cell::new(v.count),
                Cell::new(format!("{:.2}", v.mae)),
                Cell::new(format!("{:.2}", v.rmse)),
                Cell::new(format!("{}%", opt(v.relative_mae.map(|r| r * 100.0), 1))),
                Cell::new(format!("{:.2}", v.bias)),
                Cell::new(opt(v.bias_pct, 1)),
                Cell::new(opt(v.correlation, 3)),
            ]);
        }
        table.to_string()
    }

    #[must_use]
    pub fn tuning(cells: &[TuningCell], top: usize) -> String {
        let mut table = new_table(&["Rank", "Window days", "Top q", "Bottom q", "Correlation"]);
        for (rank, cell) in cells.iter().take(top).enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(cell.window_days),
                Cell::new(format!("{:.2}", cell.top_quantile)),
                Cell::new(format!("{:.2}", cell.bottom_quantile)),
                Cell::new(opt(cell.correlation, 4)),
            ]);
        }
        table.to_string()
    }
}

impl JsonFormatter {
    /// Pretty-printed JSON dump of a report
    pub fn write<T: Serialize, P: AsRef<Path>>(report: &T, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_backtest::DailyError;

    fn report() -> EvaluationReport {
        EvaluationReport {
            actual: TrackMetrics {
                trades: 4,
                wins: 3,
                win_rate: 0.75,
                total_pnl: 12.5,
                pnl_per_trade: 3.125,
                mae: 1.0,
                rmse: 1.5,
                max_drawdown: -2.0,
            },
            forecast: TrackMetrics::default(),
            daily: vec![DailyError {
                date: "2024-06-01".parse().unwrap(),
                rmse_actual: Some(1.5),
                rmse_forecast: None,
                rolling_rmse_actual: None,
                rolling_rmse_forecast: None,
            }],
        }
    }

    #[test]
    fn test_evaluation_table() {
        let out = TableFormatter::evaluation(&report(), false);
        assert!(out.contains("Actuals"));
        assert!(out.contains("75.00%"));
        assert!(out.contains("-2.00"));
        assert!(!out.contains("2024-06-01"));

        let out = TableFormatter::evaluation(&report(), true);
        assert!(out.contains("2024-06-01"));
    }

    #[test]
    fn test_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("evaluation.json");
        JsonFormatter::write(&report(), &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["actual"]["trades"], 4);
        assert_eq!(value["daily"][0]["rmse_forecast"], serde_json::Value::Null);
    }
}
