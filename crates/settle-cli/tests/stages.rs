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

//! Every stage in order against a CSV directory and an on-disk snapshot store.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use settle_cli::Workspace;
use settle_cli::cli::{JsonFormatter, ModelOverrides, TableFormatter};
use settle_core::config::load_config;
use settle_types::WeightScheme;

fn write_market_csv(dir: &Path) {
    let start: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
    let mut csv = String::from("Time;Demand;DemandForecast;Bilans;Fixing\n");
    for day in 0..8 {
        for hour in 0..24 {
            for quarter in 0..4 {
                let t = start
                    + TimeDelta::days(day)
                    + TimeDelta::hours(hour)
                    + TimeDelta::minutes(15 * quarter);
                let demand = 1000.0 + 10.0 * hour as f64 + day as f64;
                let bilans = 100.0 + 0.5 * demand;
                writeln!(
                    csv,
                    "{};{:.1};{:.1};{:.2};{:.2}",
                    t.format("%Y-%m-%d %H:%M:%S"),
                    demand,
                    demand + 4.0,
                    bilans,
                    bilans - 5.0
                )
                .unwrap();
            }
        }
    }
    std::fs::create_dir_all(dir.join("market")).unwrap();
    std::fs::write(dir.join("market").join("prices.csv"), csv).unwrap();
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = format!(
        r#"
[storage]
database = "{db}"
export_dir = "{out}"

[[providers]]
id = "market"
root = "{root}"
delimiter = ";"

[[datasets]]
source = "market"
dataset = "prices.csv"
delivery = {{ kind = "utc_column", column = "Time" }}
publication = {{ kind = "delivery_plus", hours = 1 }}
columns = {{ "Demand" = "demand_actual", "DemandForecast" = "demand_forecast", "Bilans" = "bilans_price", "Fixing" = "fixing1_price" }}

[features]
peak_hours = {{ enabled = false }}
supply_spikes = {{ enabled = false }}

[model]
train_days = 3
embargo_days = 1
weighting = "exp"
features = [{{ actual = "demand_actual", forecast = "demand_forecast" }}]
"#,
        db = dir.join("snapshots.db").display(),
        out = dir.join("out").display(),
        root = dir.join("market").display(),
    );
    let path = dir.join("settle.toml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_all_stages_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_market_csv(dir.path());
    let config = load_config(write_config(dir.path())).unwrap();
    let mut workspace = Workspace::open(config).unwrap();

    let datasets = workspace.ingest().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].rows, 768);
    assert_eq!(datasets[0].observations, 4 * 768);
    assert!(TableFormatter::datasets(&datasets).contains("prices.csv"));

    let merged = workspace.merge().unwrap();
    assert_eq!(merged.len(), 4);
    assert!(merged.iter().all(|r| r.resolved == 768));

    let final_frame = workspace.features().unwrap();
    assert_eq!(final_frame.len(), 768);
    assert!(final_frame.has_column("spread"));

    let overrides = ModelOverrides {
        weighting: Some(WeightScheme::Uniform),
        ..ModelOverrides::default()
    };
    overrides.apply(&mut workspace.config_mut().model);
    let walk = workspace.train().unwrap();
    assert_eq!(walk.predicted_days(), 7);
    assert_eq!(walk.skipped_days(), 1);

    let report = workspace.evaluate().unwrap();
    assert_eq!(report.actual.trades, 7 * 96);
    assert!((report.actual.win_rate - 1.0).abs() < 1e-12);
    assert!((report.actual.pnl_per_trade - 1.25).abs() < 1e-6);
    assert!((report.forecast.rmse - 2.0).abs() < 1e-4);

    JsonFormatter::write(&report, workspace.report_path()).unwrap();
    let out = dir.path().join("out");
    for name in ["combined.csv", "final.csv", "result.csv", "evaluation.json"] {
        assert!(out.join(name).exists(), "{name} missing");
    }

    let validation = workspace.validate(&[]).unwrap();
    assert_eq!(validation.len(), 1);
    assert!((validation[0].bias - 4.0).abs() < 1e-9);
}

#[test]
fn test_stage_out_of_order_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_market_csv(dir.path());
    let config = load_config(write_config(dir.path())).unwrap();
    let mut workspace = Workspace::open(config).unwrap();

    let err = workspace.train().unwrap_err();
    assert!(format!("{err:#}").contains("final"));
}
