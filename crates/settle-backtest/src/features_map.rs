// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Feature -> forecast-feature mapping, kept as a two-column CSV
//! (`actual,forecast`) next to the configuration.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use settle_types::FeaturePair;

pub fn read_features_map<R: Read>(reader: R) -> Result<Vec<FeaturePair>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut pairs: Vec<FeaturePair> = Vec::new();
    for (line, record) in csv_reader.deserialize().enumerate() {
        let pair: FeaturePair =
            record.with_context(|| format!("Invalid features map entry {}", line + 1))?;
        if pairs.iter().any(|p| p.actual == pair.actual) {
            bail!("Feature '{}' is mapped twice", pair.actual);
        }
        pairs.push(pair);
    }
    if pairs.is_empty() {
        bail!("Features map is empty");
    }
    Ok(pairs)
}

pub fn load_features_map<P: AsRef<Path>>(path: P) -> Result<Vec<FeaturePair>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open features map {}", path.display()))?;
    read_features_map(file).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_features_map() {
        let raw = "actual,forecast\ndemand_actual, demand_forecast_fix\nwind_actual,wind_forecast_interpolate\n";
        let pairs = read_features_map(raw.as_bytes()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].forecast, "demand_forecast_fix");
        assert_eq!(pairs[1].actual, "wind_actual");
    }

    #[test]
    fn test_rejects_duplicates_and_empty_maps() {
        assert!(read_features_map("actual,forecast\na,b\na,c\n".as_bytes()).is_err());
        assert!(read_features_map("actual,forecast\n".as_bytes()).is_err());
        assert!(read_features_map("feature,other\na,b\n".as_bytes()).is_err());
    }
}
