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

//! Batch stages from raw upstream tables to the quarter-hour feature frame.
//!
//! - **ingest**: every configured dataset through the generic adapter
//! - **merge**: as-of resolution per series, joined on the delivery instant
//! - **features**: forecast smoothing, regular grid, spread, peak hours and
//!   supply spikes

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::Serialize;
use settle_types::columns;
use settle_types::{
    FeatureConfig, Granularity, MergeConfig, Observation, PipelineConfig, PolicyKind, SeriesRule,
    SourceId,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapter::{SkipCounts, SourceAdapter};
use crate::asof::{
    AsOfEngine, AsOfPolicy, CutoffWindow, Lookback, MergeError, MergeReport, SourcePrecedence,
};
use crate::features;
use crate::frame::{Frame, FrameError};
use crate::provider::DatasetProvider;
use crate::resample;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Outcome of ingesting one dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub source: SourceId,
    pub dataset: String,
    pub rows: usize,
    pub observations: usize,
    pub skipped: SkipCounts,
}

/// Fetch and convert every configured dataset.
///
/// Sequence numbers keep increasing per source across datasets, so a later
/// dataset of the same source wins same-instant ties against an earlier one.
pub fn ingest(
    config: &PipelineConfig,
    zone: Tz,
    providers: &[Box<dyn DatasetProvider>],
) -> Result<(Vec<Observation>, Vec<DatasetReport>)> {
    let known: Vec<SourceId> = providers.iter().map(|p| p.id().clone()).collect();
    let mut next_sequence: HashMap<SourceId, u64> = HashMap::new();
    let mut observations = Vec::new();
    let mut reports = Vec::with_capacity(config.datasets.len());

    for spec in &config.datasets {
        crate::adapter::check_source(spec, &known)?;
        let provider = providers
            .iter()
            .find(|p| p.id().as_str() == spec.source)
            .with_context(|| format!("No provider registered for '{}'", spec.source))?;

        let table = provider
            .fetch(&spec.dataset)
            .with_context(|| format!("Failed to fetch {}/{}", spec.source, spec.dataset))?;
        let adapter = SourceAdapter::new(spec.clone(), zone);

        let first = next_sequence.entry(adapter.source().clone()).or_insert(0);
        let output = adapter
            .ingest(&table, *first)
            .with_context(|| format!("Failed to ingest {}/{}", spec.source, spec.dataset))?;
        *first += table.len() as u64;

        reports.push(DatasetReport {
            source: adapter.source().clone(),
            dataset: spec.dataset.clone(),
            rows: table.len(),
            observations: output.observations.len(),
            skipped: output.skipped,
        });
        observations.extend(output.observations);
    }

    info!(
        "Ingested {} observations from {} datasets",
        observations.len(),
        reports.len()
    );
    Ok((observations, reports))
}

/// As-of resolution of every configured series into one frame
#[derive(Debug, Clone)]
pub struct MergeStage {
    engine: AsOfEngine,
    window: CutoffWindow,
    config: MergeConfig,
}

impl MergeStage {
    #[must_use]
    pub fn new(config: &MergeConfig, zone: Tz) -> Self {
        let lookback = config
            .lookback_hours
            .map_or(Lookback::PreviousLocalDay, |hours| {
                Lookback::Fixed(TimeDelta::hours(hours))
            });
        let window = CutoffWindow::day_ahead(zone, config.forecast_cutoff)
            .with_bound(config.cutoff_bound)
            .with_lookback(lookback);

        Self {
            engine: AsOfEngine::new(SourcePrecedence::from_names(&config.precedence)),
            window,
            config: config.clone(),
        }
    }

    #[must_use]
    pub fn policy(&self, kind: PolicyKind) -> AsOfPolicy {
        match kind {
            PolicyKind::Latest => AsOfPolicy::LatestAlways,
            PolicyKind::Cutoff => AsOfPolicy::LatestBeforeCutoff(self.window),
        }
    }

    /// Series rules in effect; without configured rules every observed
    /// series is merged with the latest-always policy
    fn rules(&self, observations: &[Observation]) -> Vec<SeriesRule> {
        if !self.config.series.is_empty() {
            return self.config.series.clone();
        }
        observations
            .iter()
            .map(|o| o.series.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|name| SeriesRule {
                name: name.to_owned(),
                policy: PolicyKind::Latest,
                fill_within_hour: false,
            })
            .collect()
    }

    pub fn run(
        &self,
        observations: &[Observation],
    ) -> Result<(Frame, Vec<MergeReport>), PipelineError> {
        let rules = self.rules(observations);
        let mut combined = Frame::new();
        let mut reports = Vec::with_capacity(rules.len());

        for rule in &rules {
            let (resolved, report) =
                self.engine
                    .resolve(&rule.name, observations, &self.policy(rule.policy))?;
            debug!(
                "Series {}: {} candidates, {} eligible, {} resolved",
                report.series, report.candidates, report.eligible, report.resolved
            );
            if resolved.is_empty() {
                warn!("Series {} has no eligible observations", rule.name);
            }
            combined = combined.outer_join(&Frame::from_resolved(&resolved)?)?;
            reports.push(report);
        }

        let grid = combined.regular_grid(Granularity::QuarterHour.step());
        let mut combined = combined.reindex(&grid);

        for rule in rules.iter().filter(|r| r.fill_within_hour) {
            if let Some(values) = combined.column(&rule.name) {
                let filled = resample::fill_forward_within_hour(combined.index(), values);
                combined.insert_column(rule.name.clone(), filled)?;
            }
        }

        for sum in &self.config.sums {
            let mut total = vec![Some(0.0); combined.len()];
            for input in &sum.inputs {
                let values = combined.require(input)?;
                for (acc, v) in total.iter_mut().zip(values) {
                    *acc = acc.zip(*v).map(|(a, b)| a + b);
                }
            }
            combined.insert_column(sum.name.clone(), total)?;
        }

        combined.ensure_unique_index()?;
        info!(
            "Merged {} series into {} quarter-hour rows",
            reports.len(),
            combined.len()
        );
        Ok((combined, reports))
    }
}

/// Build the feature frame from the combined frame
pub fn build_features(combined: &Frame, config: &FeatureConfig) -> Result<Frame, FrameError> {
    let forecasts: Vec<&str> = config
        .forecast_columns
        .iter()
        .map(String::as_str)
        .filter(|name| {
            let present = combined.has_column(name);
            if !present {
                debug!("Forecast column {} not present, not smoothing it", name);
            }
            present
        })
        .collect();

    // the blend looks one hour ahead on the native rows, before regridding
    let mut native = combined.clone();
    for name in &forecasts {
        let blended =
            resample::blend_next_hour(native.index(), native.require(name)?, config.blend_weight);
        native.insert_column(format!("{name}{}", columns::FIX_SUFFIX), blended)?;
    }

    let grid = native.regular_grid(Granularity::QuarterHour.step());
    let mut frame = native.reindex(&grid);

    for name in &forecasts {
        let fix = format!("{name}{}", columns::FIX_SUFFIX);
        let interpolated = resample::interpolate_by_index(frame.index(), frame.require(name)?);
        let held = resample::fill_forward(frame.require(name)?);
        let held_fix = resample::fill_forward(frame.require(&fix)?);

        frame.insert_column(format!("{name}{}", columns::INTERPOLATE_SUFFIX), interpolated)?;
        frame.insert_column(*name, held)?;
        frame.insert_column(fix, held_fix)?;
    }

    add_spread(&mut frame)?;

    if config.peak_hours.enabled {
        let required = [
            columns::DEMAND_ACTUAL,
            columns::DEMAND_KSE_FORECAST,
            columns::WIND_ACTUAL,
            columns::PV_ACTUAL,
            columns::WIND_FORECAST_INTERPOLATED,
            columns::PV_FORECAST_INTERPOLATED,
        ];
        match required.iter().find(|c| !frame.has_column(c)) {
            Some(missing) => warn!("Skipping peak hours: column {} is missing", missing),
            None => features::add_peak_hours(&mut frame, &config.peak_hours)?,
        }
    }

    let spikes = &config.supply_spikes;
    if spikes.enabled {
        if frame.has_column(&spikes.actual) && frame.has_column(&spikes.forecast) {
            features::add_supply_spikes(&mut frame, spikes)?;
        } else {
            warn!(
                "Skipping supply spikes: {} or {} is missing",
                spikes.actual, spikes.forecast
            );
        }
    }

    frame.ensure_unique_index()?;
    info!(
        "Feature frame: {} rows, {} columns",
        frame.len(),
        frame.column_names().count()
    );
    Ok(frame)
}

/// `spread = bilans_price - fixing1_price`, when both prices are present
fn add_spread(frame: &mut Frame) -> Result<(), FrameError> {
    let (Some(balancing), Some(fixing)) = (
        frame.column(columns::BALANCING_PRICE),
        frame.column(columns::FIXING1_PRICE),
    ) else {
        return Ok(());
    };
    let spread = balancing
        .iter()
        .zip(fixing)
        .map(|(b, f)| Some((*b)? - (*f)?))
        .collect();
    frame.insert_column(columns::SPREAD, spread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveTime, Utc};
    use chrono_tz::Europe::Warsaw;
    use settle_types::{DerivedSum, Value};

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn obs(series: &str, delivery: &str, published: &str, source: &str, v: f64) -> Observation {
        Observation::new(
            series,
            utc(delivery),
            utc(published),
            SourceId::from(source),
            Value::Number(v),
        )
    }

    fn merge_config() -> MergeConfig {
        MergeConfig {
            precedence: vec!["pse".to_owned(), "entsoe".to_owned()],
            forecast_cutoff: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
            series: vec![
                SeriesRule {
                    name: "fixing1_price".to_owned(),
                    policy: PolicyKind::Latest,
                    fill_within_hour: true,
                },
                SeriesRule {
                    name: "wind_forecast".to_owned(),
                    policy: PolicyKind::Cutoff,
                    fill_within_hour: false,
                },
            ],
            sums: vec![DerivedSum {
                name: "total".to_owned(),
                inputs: vec!["fixing1_price".to_owned(), "wind_forecast".to_owned()],
            }],
            ..MergeConfig::default()
        }
    }

    #[test]
    fn test_merge_applies_policies_and_fill() {
        let observations = vec![
            obs("fixing1_price", "2024-05-02T10:00:00Z", "2024-05-01T11:00:00Z", "pse", 400.0),
            // published 10:20 local, after the cutoff
            obs("wind_forecast", "2024-05-02T10:00:00Z", "2024-05-01T08:20:00Z", "pse", 9.0),
            obs("wind_forecast", "2024-05-02T10:00:00Z", "2024-05-01T07:00:00Z", "pse", 5.0),
            obs("wind_forecast", "2024-05-02T10:30:00Z", "2024-05-01T07:00:00Z", "pse", 6.0),
        ];

        let stage = MergeStage::new(&merge_config(), Warsaw);
        let (frame, reports) = stage.run(&observations).unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("fixing1_price").unwrap(), &[Some(400.0); 3]);
        assert_eq!(
            frame.column("wind_forecast").unwrap(),
            &[Some(5.0), None, Some(6.0)]
        );
        assert_eq!(frame.column("total").unwrap(), &[Some(405.0), None, Some(406.0)]);
        assert_eq!(reports[1].candidates, 3);
        assert_eq!(reports[1].eligible, 2);
    }

    #[test]
    fn test_merge_tie_without_precedence_is_fatal() {
        let observations = vec![
            obs("pv_actual", "2024-05-02T10:00:00Z", "2024-05-02T11:00:00Z", "a", 1.0),
            obs("pv_actual", "2024-05-02T10:00:00Z", "2024-05-02T11:00:00Z", "b", 2.0),
        ];
        let stage = MergeStage::new(&MergeConfig::default(), Warsaw);
        let err = stage.run(&observations).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Merge(MergeError::UnresolvableTie { .. })
        ));
    }

    #[test]
    fn test_features_blend_interpolate_and_spread() {
        let start = utc("2024-01-01T00:00:00Z");
        let hourly: Vec<(DateTime<Utc>, f64)> = (0..3)
            .map(|h| (start + TimeDelta::hours(h), [16.0, 32.0, 0.0][usize::try_from(h).unwrap()]))
            .collect();
        let mut frame = Frame::from_points("wind_forecast", hourly).unwrap();
        frame = frame.reindex(&frame.regular_grid(TimeDelta::minutes(15)));
        let n = frame.len();
        frame
            .insert_column("bilans_price", vec![Some(10.0); n])
            .unwrap();
        frame
            .insert_column("fixing1_price", vec![Some(7.5); n])
            .unwrap();

        let config = FeatureConfig {
            forecast_columns: vec!["wind_forecast".to_owned(), "pv_forecast".to_owned()],
            ..FeatureConfig::default()
        };
        let out = build_features(&frame, &config).unwrap();

        assert_eq!(out.len(), 9);
        assert_eq!(out.get("wind_forecast_fix", 0), Some(22.0));
        assert_eq!(out.get("wind_forecast_fix", 1), Some(22.0));
        assert_eq!(out.get("wind_forecast_fix", 4), Some(20.0));
        assert_eq!(out.get("wind_forecast_fix", 8), Some(20.0));
        assert_eq!(out.get("wind_forecast_interpolate", 2), Some(24.0));
        assert_eq!(out.get("wind_forecast", 2), Some(16.0));
        assert_eq!(out.get("spread", 3), Some(2.5));
        assert!(!out.has_column("pv_forecast_fix"));
        assert!(!out.has_column(columns::PEAK_HOURS_CALC_ACTUAL));
    }
}
