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

//! Pipeline stages driven by the `settle` binary.
//!
//! Every stage loads its input snapshot, writes its own snapshot and a CSV
//! export named after the stage, and returns its report for printing.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use settle_backtest::{
    EvaluationReport, WalkForwardConfig, WalkForwardReport, add_trading_columns, evaluate,
    load_features_map, run_walk_forward,
};
use settle_core::features::{self, TuningCell, TuningGrid};
use settle_core::snapshot::stage;
use settle_core::{
    DatasetReport, ForecastValidation, Frame, MergeReport, MergeStage, SnapshotStore, build_features,
    config, export_csv, ingest, validate_forecast,
};
use settle_types::{FeaturePair, PipelineConfig};
use tracing::{info, warn};

/// Configuration plus the snapshot store it points at
#[derive(Debug)]
pub struct Workspace {
    config: PipelineConfig,
    zone: Tz,
    store: SnapshotStore,
}

impl Workspace {
    pub fn new(config: PipelineConfig, store: SnapshotStore) -> Result<Self> {
        let zone = config::zone(&config)?;
        Ok(Self {
            config,
            zone,
            store,
        })
    }

    /// Open the snapshot database named by the configuration
    pub fn open(config: PipelineConfig) -> Result<Self> {
        let store = SnapshotStore::open(&config.storage.database)?;
        Self::new(config, store)
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    fn export_path(&self, stage: &str) -> PathBuf {
        self.config.storage.export_dir.join(format!("{stage}.csv"))
    }

    fn store_frame(&mut self, stage: &str, frame: &Frame) -> Result<()> {
        self.store.save_frame(stage, frame)?;
        let path = self.export_path(stage);
        export_csv(frame, &path, self.zone)?;
        info!(
            "Stage {}: {} rows, {} columns, exported to {}",
            stage,
            frame.len(),
            frame.column_names().count(),
            path.display()
        );
        Ok(())
    }

    pub fn ingest(&mut self) -> Result<Vec<DatasetReport>> {
        let providers = config::build_providers(&self.config)?;
        let (observations, reports) = ingest(&self.config, self.zone, &providers)?;
        if observations.is_empty() {
            warn!("No observations were ingested");
        }
        self.store.save_observations(&observations)?;
        info!("Stored {} observations", observations.len());
        Ok(reports)
    }

    pub fn merge(&mut self) -> Result<Vec<MergeReport>> {
        let observations = self.store.load_observations()?;
        if observations.is_empty() {
            bail!("No stored observations, run the ingest stage first");
        }
        let merge = MergeStage::new(&self.config.merge, self.zone);
        let (combined, reports) = merge.run(&observations).context("Merge stage failed")?;
        self.store_frame(stage::COMBINED, &combined)?;
        Ok(reports)
    }

    pub fn features(&mut self) -> Result<Frame> {
        let combined = self.store.load_frame(stage::COMBINED)?;
        let final_frame =
            build_features(&combined, &self.config.features).context("Feature stage failed")?;
        self.store_frame(stage::FINAL, &final_frame)?;
        Ok(final_frame)
    }

    /// Model features: the features map file when configured, the inline list otherwise
    pub fn model_features(&self) -> Result<Vec<FeaturePair>> {
        let features = match &self.config.model.features_map {
            Some(path) => load_features_map(path)?,
            None => self.config.model.features.clone(),
        };
        if features.is_empty() {
            bail!("No model features configured, set model.features or model.features_map");
        }
        Ok(features)
    }

    pub fn train(&mut self) -> Result<WalkForwardReport> {
        let final_frame = self.store.load_frame(stage::FINAL)?;
        let walk = WalkForwardConfig::from_model(&self.config.model, self.model_features()?);
        info!(
            "Training {} on {} features: {} days, embargo {}, weighting {}",
            walk.target,
            walk.features.len(),
            walk.train_days,
            walk.embargo_days,
            walk.weighting
        );

        let (mut result, report) =
            run_walk_forward(&final_frame, &walk).context("Walk-forward stage failed")?;
        add_trading_columns(&mut result, walk.target).context("Failed to add trading columns")?;
        self.store_frame(stage::RESULT, &result)?;
        Ok(report)
    }

    pub fn evaluate(&self) -> Result<EvaluationReport> {
        let result = self.store.load_frame(stage::RESULT)?;
        let report = evaluate(&result).context("Evaluation failed")?;
        Ok(report)
    }

    /// Path of the JSON evaluation report
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.config.storage.export_dir.join("evaluation.json")
    }

    /// Validate forecast columns of the final frame.
    ///
    /// Pairs are (forecast, actual); an empty list validates every model
    /// feature against its forecast stand-in.
    pub fn validate(&self, pairs: &[(String, String)]) -> Result<Vec<ForecastValidation>> {
        let final_frame = self.store.load_frame(stage::FINAL)?;
        let pairs: Vec<(String, String)> = if pairs.is_empty() {
            self.model_features()?
                .into_iter()
                .map(|f| (f.forecast, f.actual))
                .collect()
        } else {
            pairs.to_vec()
        };

        let mut results = Vec::with_capacity(pairs.len());
        for (forecast, actual) in &pairs {
            match validate_forecast(&final_frame, forecast, actual)? {
                Some(v) => results.push(v),
                None => warn!("{} and {} share no rows", forecast, actual),
            }
        }
        Ok(results)
    }

    pub fn tune_peak_hours(&self, reference: &str, grid: &TuningGrid) -> Result<Vec<TuningCell>> {
        let final_frame = self.store.load_frame(stage::FINAL)?;
        let cells = features::tune_peak_hours(&final_frame, reference, grid)
            .context("Peak-hour tuning failed")?;
        if let Some(best) = cells.first() {
            info!(
                "Best peak-hour bands: {} days, top {:.2}, bottom {:.2}",
                best.window_days, best.top_quantile, best.bottom_quantile
            );
        }
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_names_the_stage() {
        let store = SnapshotStore::in_memory().unwrap();
        let mut workspace = Workspace::new(PipelineConfig::default(), store).unwrap();

        let err = workspace.features().unwrap_err();
        assert!(format!("{err:#}").contains("combined"));
        assert!(workspace.merge().is_err());
    }

    #[test]
    fn test_model_features_required() {
        let config = PipelineConfig::default();
        let workspace = Workspace::new(config, SnapshotStore::in_memory().unwrap()).unwrap();
        assert!(workspace.model_features().is_err());
    }
}
