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

//! Ingest -> merge -> features -> snapshot over a spring-forward day

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use settle_core::snapshot::stage;
use settle_core::{
    DatasetProvider, Frame, FrameError, MemoryProvider, MergeError, MergeStage, PipelineError,
    SnapshotStore, Table, build_features, export_csv, ingest,
};
use settle_types::{PipelineConfig, SourceId};

const CONFIG: &str = r#"
    [[providers]]
    id = "pse"
    root = "unused"

    [[providers]]
    id = "entsoe"
    root = "unused"

    [[datasets]]
    source = "pse"
    dataset = "demand"
    delivery = { kind = "local_slots", date_column = "Doba", granularity = "quarter_hour" }
    publication = { kind = "delivery_plus", hours = 1 }
    columns = { "Zapotrzebowanie" = "demand_actual" }

    [[datasets]]
    source = "entsoe"
    dataset = "wind"
    delivery = { kind = "utc_column", column = "Start" }
    publication = { kind = "utc_column", column = "Published" }
    columns = { "Wind" = "wind_forecast" }

    [merge]
    precedence = ["pse", "entsoe"]
    forecast_cutoff = "10:15:00"

    [[merge.series]]
    name = "demand_actual"

    [[merge.series]]
    name = "wind_forecast"
    policy = "cutoff"

    [features]
    forecast_columns = ["wind_forecast"]
    peak_hours = { enabled = false }
    supply_spikes = { enabled = false }
"#;

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn demand_table() -> Table {
    // one row more than the 92 quarter-hours of the short day
    let rows = (0..93)
        .map(|i| vec!["2024-03-31".to_owned(), format!("1 {:03},5", i)])
        .collect();
    Table::new(vec!["Doba".to_owned(), "Zapotrzebowanie".to_owned()], rows)
}

fn wind_table() -> Table {
    let start = utc("2024-03-31T00:00:00Z");
    let mut rows = Vec::new();
    for (published, value) in [("2024-03-30T08:00:00Z", "100"), ("2024-03-30T09:30:00Z", "999")] {
        for h in 0..21 {
            rows.push(vec![
                (start + TimeDelta::hours(h)).to_rfc3339(),
                published.to_owned(),
                value.to_owned(),
            ]);
        }
    }
    Table::new(
        vec!["Start".to_owned(), "Published".to_owned(), "Wind".to_owned()],
        rows,
    )
}

fn providers() -> Vec<Box<dyn DatasetProvider>> {
    let pse = MemoryProvider::new(SourceId::from("pse")).with_table("demand", demand_table());
    let entsoe = MemoryProvider::new(SourceId::from("entsoe")).with_table("wind", wind_table());
    vec![Box::new(pse) as Box<dyn DatasetProvider>, Box::new(entsoe)]
}

#[test]
fn test_stages_over_short_day() {
    let config: PipelineConfig = toml::from_str(CONFIG).unwrap();
    settle_core::config::validate(&config).unwrap();
    let zone = settle_core::config::zone(&config).unwrap();

    let (observations, reports) = ingest(&config, zone, &providers()).unwrap();
    assert_eq!(reports[0].observations, 92);
    assert_eq!(reports[0].skipped.slot_out_of_range, 1);
    assert_eq!(reports[1].observations, 42);

    let (combined, merge_reports) = MergeStage::new(&config.merge, zone).run(&observations).unwrap();
    assert_eq!(combined.len(), 92);
    assert_eq!(combined.index()[0], utc("2024-03-30T23:00:00Z"));
    assert_eq!(combined.index()[91], utc("2024-03-31T21:45:00Z"));
    assert_eq!(combined.get("demand_actual", 0), Some(1000.5));
    assert_eq!(combined.get("demand_actual", 91), Some(1091.5));

    // the 10:30 local revision came after the cutoff
    let wind: Vec<f64> = combined
        .column("wind_forecast")
        .unwrap()
        .iter()
        .flatten()
        .copied()
        .collect();
    assert_eq!(wind.len(), 21);
    assert!(wind.iter().all(|v| (*v - 100.0).abs() < f64::EPSILON));
    assert_eq!(merge_reports[1].candidates, 42);
    assert_eq!(merge_reports[1].eligible, 21);

    let features = build_features(&combined, &config.features).unwrap();
    assert_eq!(features.len(), 92);
    assert_eq!(features.get("wind_forecast_interpolate", 0), None);
    assert_eq!(features.get("wind_forecast_fix", 91), Some(100.0));
    features.ensure_unique_index().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::open(dir.path().join("settle.db")).unwrap();
    store.save_observations(&observations).unwrap();
    store.save_frame(stage::COMBINED, &combined).unwrap();
    store.save_frame(stage::FINAL, &features).unwrap();

    assert_eq!(store.load_observations().unwrap().len(), observations.len());
    assert_eq!(store.load_frame(stage::FINAL).unwrap(), features);

    let export = dir.path().join("out").join("final.csv");
    export_csv(&features, &export, zone).unwrap();
    let text = std::fs::read_to_string(export).unwrap();
    assert_eq!(text.lines().count(), 93);
    assert!(text.contains("2024-03-31 03:00:00+02:00"));
}

#[test]
fn test_injected_duplicate_instant_is_fatal() {
    let t = utc("2024-03-31T01:00:00Z");
    let mut columns = BTreeMap::new();
    columns.insert(
        "demand_actual".to_owned(),
        vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
    );
    let err = Frame::from_parts(
        vec![t, t + TimeDelta::minutes(15), t, t + TimeDelta::minutes(15)],
        columns,
    )
    .unwrap_err();

    assert_eq!(err, FrameError::DuplicateIndex { count: 2, first: t });
    assert!(err.to_string().starts_with("2 duplicate delivery instants"));
}

#[test]
fn test_conflicting_sources_without_precedence_halt_the_merge() {
    let mut config: PipelineConfig = toml::from_str(CONFIG).unwrap();
    config.merge.precedence.clear();
    let zone = settle_core::config::zone(&config).unwrap();

    let mut observations = ingest(&config, zone, &providers()).unwrap().0;
    let mut clash = observations[0].clone();
    clash.source = SourceId::from("entsoe");
    clash.value = settle_types::Value::Number(-1.0);
    observations.push(clash);

    let err = MergeStage::new(&config.merge, zone)
        .run(&observations)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Merge(MergeError::UnresolvableTie { .. })
    ));
}
