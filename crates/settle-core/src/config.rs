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

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use settle_types::PipelineConfig;
use tracing::info;

use crate::calendar;
use crate::provider::{CsvDirectoryProvider, DatasetProvider};

/// Read and validate a TOML pipeline configuration
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PipelineConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    validate(&config)?;
    info!(
        "Loaded configuration from {} ({} providers, {} datasets)",
        path.display(),
        config.providers.len(),
        config.datasets.len()
    );
    Ok(config)
}

/// Zone all local timestamps are interpreted in
pub fn zone(config: &PipelineConfig) -> Result<Tz> {
    Ok(calendar::parse_zone(&config.calendar.zone)?)
}

pub fn validate(config: &PipelineConfig) -> Result<()> {
    zone(config)?;

    let mut ids = HashSet::new();
    for provider in &config.providers {
        if provider.id.is_empty() {
            bail!("Provider with root {} has an empty id", provider.root.display());
        }
        if !ids.insert(provider.id.as_str()) {
            bail!("Provider '{}' is configured twice", provider.id);
        }
    }

    for (idx, dataset) in config.datasets.iter().enumerate() {
        if !ids.contains(dataset.source.as_str()) {
            bail!(
                "Dataset {} ('{}') refers to unknown provider '{}'",
                idx,
                dataset.dataset,
                dataset.source
            );
        }
        if dataset.columns.is_empty() {
            bail!("Dataset '{}' maps no columns", dataset.dataset);
        }
    }

    let features = &config.features;
    if !(0.0..=1.0).contains(&features.blend_weight) {
        bail!("blend_weight must be within [0, 1], got {}", features.blend_weight);
    }
    for (name, top, bottom) in [
        (
            "peak_hours",
            features.peak_hours.top_quantile,
            features.peak_hours.bottom_quantile,
        ),
        (
            "supply_spikes",
            features.supply_spikes.top_quantile,
            features.supply_spikes.bottom_quantile,
        ),
    ] {
        if !(0.0..=1.0).contains(&top) || !(0.0..=1.0).contains(&bottom) || bottom > top {
            bail!("{name}: quantiles must satisfy 0 <= bottom <= top <= 1");
        }
    }
    if features.peak_hours.window_days == 0 {
        bail!("peak_hours.window_days must be at least 1");
    }

    if config.model.train_days == 0 {
        bail!("model.train_days must be at least 1");
    }
    Ok(())
}

/// Directory providers for every configured provider entry
pub fn build_providers(config: &PipelineConfig) -> Result<Vec<Box<dyn DatasetProvider>>> {
    config
        .providers
        .iter()
        .map(|p| Ok(Box::new(CsvDirectoryProvider::from_config(p)?) as Box<dyn DatasetProvider>))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [calendar]
        zone = "Europe/Warsaw"

        [[providers]]
        id = "pse"
        root = "data/pse"

        [[datasets]]
        source = "pse"
        dataset = "demand.csv"
        delivery = { kind = "utc_column", column = "Time" }
        publication = { kind = "delivery_plus", hours = 1 }
        columns = { "Demand" = "demand_actual" }
    "#;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(zone(&config).unwrap(), chrono_tz::Europe::Warsaw);
        assert_eq!(build_providers(&config).unwrap().len(), 1);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: PipelineConfig =
            toml::from_str(include_str!("../../../settle.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.merge.sums[0].inputs.len(), 2);
        assert_eq!(config.model.features.len(), 5);
        assert_eq!(
            config.model.first_day,
            chrono::NaiveDate::from_ymd_opt(2024, 10, 1)
        );
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        config.datasets[0].source = "entsoe".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown provider 'entsoe'"));
    }

    #[test]
    fn test_bad_zone_and_quantiles_are_rejected() {
        let mut config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        config.calendar.zone = "Mars/Olympus".to_owned();
        assert!(validate(&config).is_err());

        let mut config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        config.features.peak_hours.bottom_quantile = 0.95;
        assert!(validate(&config).is_err());
    }
}
