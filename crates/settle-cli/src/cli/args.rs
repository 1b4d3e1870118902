// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! CLI argument definitions using clap.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use settle_types::{ModelConfig, Target, WeightScheme};

#[derive(Debug, Parser)]
#[command(name = "settle")]
#[command(author, version, about = "Settle reconciliation and backtest pipeline")]
#[command(
    long_about = "Batch pipeline reconciling Polish market and grid datasets into a\n\
    quarter-hour table, then backtesting a walk-forward price model on it.\n\
    \nEach stage reads the snapshot written by the stage before it, so stages\n\
    can be rerun one at a time.\n\
    \nExamples:\n  \
    settle run                              # All stages with settle.toml\n  \
    settle --config prod.toml merge         # Re-merge stored observations\n  \
    settle train --train-days 60 --weighting linear"
)]
pub struct Cli {
    /// Pipeline configuration file
    #[arg(
        long,
        short,
        global = true,
        value_name = "PATH",
        default_value = "settle.toml"
    )]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read every configured dataset and store the observations
    Ingest,

    /// Resolve observations per series and join them on the quarter-hour grid
    #[command(
        long_about = "Resolve every series as of its policy and join them.\n\
        \nForecast series configured with the cutoff policy only see vintages\n\
        published inside the day-ahead window. Ties between sources are\n\
        broken by publication time, then sequence, then source precedence;\n\
        conflicting values left over halt the merge."
    )]
    Merge,

    /// Derive blended, interpolated, spread and peak-hour columns
    Features,

    /// Run the walk-forward model and add trading columns
    Train(ModelOverrides),

    /// Print trading metrics of both prediction tracks
    Evaluate(EvaluateArgs),

    /// Compare forecast columns with their realised counterparts
    Validate(ValidateArgs),

    /// Grid-search peak-hour band parameters
    #[command(name = "tune-peak-hours")]
    TunePeakHours(TuneArgs),

    /// Run every stage in order
    Run(RunArgs),
}

/// Command-line overrides of the `[model]` section
#[derive(Debug, Clone, Default, Args)]
pub struct ModelOverrides {
    /// Days of history per training window
    #[arg(long, value_name = "DAYS")]
    pub train_days: Option<u32>,

    /// Sample weighting: none, linear or exp
    #[arg(long, value_name = "SCHEME")]
    pub weighting: Option<WeightScheme>,

    /// Predicted column: bilans_price or spread
    #[arg(long, value_name = "COLUMN")]
    pub target: Option<Target>,

    /// First trading day to predict
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub first_day: Option<NaiveDate>,

    /// Two-column CSV (actual,forecast) listing the model features
    #[arg(long, value_name = "PATH")]
    pub features_map: Option<PathBuf>,
}

impl ModelOverrides {
    pub fn apply(&self, model: &mut ModelConfig) {
        if let Some(days) = self.train_days {
            model.train_days = days;
        }
        if let Some(weighting) = self.weighting {
            model.weighting = weighting;
        }
        if let Some(target) = self.target {
            model.target = target;
        }
        if let Some(day) = self.first_day {
            model.first_day = Some(day);
        }
        if let Some(path) = &self.features_map {
            model.features_map = Some(path.clone());
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct EvaluateArgs {
    /// Also print the daily RMSE table
    #[arg(long, default_value_t = false)]
    pub daily: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Pairs to compare as FORECAST=ACTUAL; defaults to the model features
    #[arg(long = "pair", value_name = "FORECAST=ACTUAL", value_parser = parse_pair)]
    pub pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Args)]
pub struct TuneArgs {
    /// Column holding the published peak-hour state
    #[arg(long, default_value = settle_types::columns::PEAK_HOURS_PUBLISHED)]
    pub reference: String,

    /// Rolling window lengths in days
    #[arg(long, value_delimiter = ',', default_value = "7,14,21,28")]
    pub window_days: Vec<u32>,

    /// Distances of the top quantile from 1.0
    #[arg(long, value_delimiter = ',', default_value = "0.05,0.1,0.15,0.2")]
    pub top_offsets: Vec<f64>,

    /// Bottom quantiles
    #[arg(long, value_delimiter = ',', default_value = "0.05,0.1,0.15,0.2")]
    pub bottom_quantiles: Vec<f64>,

    /// Number of best cells to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub model: ModelOverrides,

    /// Stop after the features stage
    #[arg(long, default_value_t = false)]
    pub skip_model: bool,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((forecast, actual)) if !forecast.trim().is_empty() && !actual.trim().is_empty() => {
            Ok((forecast.trim().to_owned(), actual.trim().to_owned()))
        }
        _ => Err(format!("expected FORECAST=ACTUAL, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_overrides() {
        let cli = Cli::try_parse_from([
            "settle",
            "train",
            "--train-days",
            "60",
            "--weighting",
            "linear",
            "--target",
            "spread",
        ])
        .unwrap();
        let Commands::Train(overrides) = cli.command else {
            panic!("expected train");
        };

        let mut model = ModelConfig::default();
        overrides.apply(&mut model);
        assert_eq!(model.train_days, 60);
        assert_eq!(model.weighting, WeightScheme::Linear);
        assert_eq!(model.target, Target::Spread);
        assert_eq!(cli.config, PathBuf::from("settle.toml"));
    }

    #[test]
    fn test_bad_weighting_is_rejected() {
        assert!(Cli::try_parse_from(["settle", "train", "--weighting", "cubic"]).is_err());
    }

    #[test]
    fn test_global_flags_and_pairs() {
        let cli = Cli::try_parse_from([
            "settle",
            "validate",
            "--pair",
            "wind_forecast_interpolate=wind_actual",
            "-c",
            "other.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(
            args.pairs,
            vec![("wind_forecast_interpolate".to_owned(), "wind_actual".to_owned())]
        );
        assert!(parse_pair("no-separator").is_err());
    }

    #[test]
    fn test_tune_grid_lists() {
        let cli = Cli::try_parse_from(["settle", "tune-peak-hours", "--window-days", "7,14"]).unwrap();
        let Commands::TunePeakHours(args) = cli.command else {
            panic!("expected tune-peak-hours");
        };
        assert_eq!(args.window_days, vec![7, 14]);
        assert_eq!(args.top_offsets.len(), 4);
        assert_eq!(args.reference, "peak_hours_actual");
    }
}
