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
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{Target, WeightScheme};
use crate::time::{Ambiguity, CutoffBound, Granularity};

// ============= Pipeline Configuration =============

/// Root of the `settle.toml` configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub datasets: Vec<DatasetSpec>,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA zone the upstream local timestamps are expressed in
    #[serde(default = "default_zone")]
    pub zone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            zone: default_zone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding one snapshot table per stage
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Directory for the human-readable CSV exports
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            export_dir: default_export_dir(),
        }
    }
}

/// Connection settings of one upstream provider.
///
/// Only directory-backed providers are built in; `root` is where the
/// provider's datasets were mirrored to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub root: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

// ============= Source Adapter Configuration =============

/// One upstream dataset and how its rows become observations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Provider id; also the source id stamped on every observation
    pub source: String,
    pub dataset: String,
    pub delivery: DeliveryAxis,
    pub publication: PublicationRule,
    /// Upstream column name -> series name
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    /// Upstream column name -> (label -> code) for categorical columns
    #[serde(default)]
    pub categories: BTreeMap<String, BTreeMap<String, i64>>,
    /// Keep deliveries whose local date is on or after this day
    #[serde(default)]
    pub from_local: Option<NaiveDate>,
    /// Keep deliveries whose local date is strictly before this day
    #[serde(default)]
    pub until_local: Option<NaiveDate>,
    /// Spread each hourly row over its four quarter-hours
    #[serde(default)]
    pub expand_hourly: bool,
    /// Upstream columns identifying duplicate rows; the first row wins
    #[serde(default)]
    pub dedup_on: Vec<String>,
}

/// Where the delivery instant of a row comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryAxis {
    /// Column already holding a UTC timestamp
    UtcColumn {
        column: String,
        #[serde(default)]
        format: Option<String>,
    },
    /// Column holding a local wall-clock timestamp
    LocalColumn {
        column: String,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        ambiguity: Ambiguity,
    },
    /// Local date plus a slot index within that day
    LocalSlots {
        date_column: String,
        #[serde(default)]
        date_format: Option<String>,
        granularity: Granularity,
        /// Column with the slot index; rows are enumerated per date when absent
        #[serde(default)]
        index_column: Option<String>,
        /// Index of the first slot as written upstream (0 or 1)
        #[serde(default)]
        index_base: usize,
        /// Extra columns that restart the enumeration, e.g. a publication stamp
        #[serde(default)]
        group_by: Vec<String>,
    },
}

/// Publication instant derived from the delivery instant alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedPublication {
    /// Local wall-clock time on the day before the delivery's local date
    DayBeforeAt { time: NaiveTime },
    /// Fixed offset after the delivery instant
    DeliveryPlus { hours: i64 },
}

/// Where the publication instant of a row comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublicationRule {
    UtcColumn {
        column: String,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        fallback: Option<DerivedPublication>,
    },
    LocalColumn {
        column: String,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        ambiguity: Ambiguity,
        #[serde(default)]
        fallback: Option<DerivedPublication>,
    },
    DayBeforeAt {
        time: NaiveTime,
    },
    DeliveryPlus {
        hours: i64,
    },
}

impl PublicationRule {
    /// Rule applied when the publication column is empty, or always for
    /// derived rules
    #[must_use]
    pub fn derived(&self) -> Option<DerivedPublication> {
        match self {
            Self::UtcColumn { fallback, .. } | Self::LocalColumn { fallback, .. } => *fallback,
            Self::DayBeforeAt { time } => Some(DerivedPublication::DayBeforeAt { time: *time }),
            Self::DeliveryPlus { hours } => Some(DerivedPublication::DeliveryPlus { hours: *hours }),
        }
    }
}

// ============= Merge Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Source ids, most trusted first
    #[serde(default)]
    pub precedence: Vec<String>,
    /// Local time of day after which a day-ahead forecast is no longer known
    #[serde(default = "default_forecast_cutoff")]
    pub forecast_cutoff: NaiveTime,
    #[serde(default)]
    pub cutoff_bound: CutoffBound,
    /// Earliest usable publication, in hours before delivery. When unset the
    /// window opens at local midnight of the day before delivery.
    #[serde(default)]
    pub lookback_hours: Option<i64>,
    #[serde(default)]
    pub series: Vec<SeriesRule>,
    #[serde(default)]
    pub sums: Vec<DerivedSum>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            precedence: Vec::new(),
            forecast_cutoff: default_forecast_cutoff(),
            cutoff_bound: CutoffBound::default(),
            lookback_hours: None,
            series: Vec::new(),
            sums: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Newest publication wins
    #[default]
    Latest,
    /// Newest publication before the daily forecast cutoff wins
    Cutoff,
}

/// Merge settings of one reconciled series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRule {
    pub name: String,
    #[serde(default)]
    pub policy: PolicyKind,
    /// Hold the value for the rest of its UTC hour
    #[serde(default)]
    pub fill_within_hour: bool,
}

/// Column computed as the sum of other columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedSum {
    pub name: String,
    pub inputs: Vec<String>,
}

// ============= Feature Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Point-forecast columns that get blended, interpolated and held
    #[serde(default = "default_forecast_columns")]
    pub forecast_columns: Vec<String>,
    /// Weight of the current hour in the two-horizon blend
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f64,
    #[serde(default)]
    pub peak_hours: PeakHoursConfig,
    #[serde(default)]
    pub supply_spikes: SupplySpikeConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            forecast_columns: default_forecast_columns(),
            blend_weight: default_blend_weight(),
            peak_hours: PeakHoursConfig::default(),
            supply_spikes: SupplySpikeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakHoursConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Trailing window the quantile bands are computed over
    #[serde(default = "default_peak_window_days")]
    pub window_days: u32,
    /// Guard period the bands are shifted forward by
    #[serde(default = "default_peak_shift_days")]
    pub shift_days: u32,
    #[serde(default = "default_top_quantile")]
    pub top_quantile: f64,
    #[serde(default = "default_bottom_quantile")]
    pub bottom_quantile: f64,
}

impl Default for PeakHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: default_peak_window_days(),
            shift_days: default_peak_shift_days(),
            top_quantile: default_top_quantile(),
            bottom_quantile: default_bottom_quantile(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplySpikeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_spike_actual")]
    pub actual: String,
    #[serde(default = "default_spike_forecast")]
    pub forecast: String,
    #[serde(default = "default_spike_window_hours")]
    pub window_hours: i64,
    #[serde(default = "default_top_quantile")]
    pub top_quantile: f64,
    #[serde(default = "default_bottom_quantile")]
    pub bottom_quantile: f64,
}

impl Default for SupplySpikeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            actual: default_spike_actual(),
            forecast: default_spike_forecast(),
            window_hours: default_spike_window_hours(),
            top_quantile: default_top_quantile(),
            bottom_quantile: default_bottom_quantile(),
        }
    }
}

// ============= Model Configuration =============

/// A model feature and the forecast column standing in for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePair {
    pub actual: String,
    pub forecast: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_train_days")]
    pub train_days: u32,
    /// Days between the end of the training window and the trading day
    #[serde(default = "default_embargo_days")]
    pub embargo_days: u32,
    #[serde(default)]
    pub weighting: WeightScheme,
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,
    #[serde(default)]
    pub target: Target,
    /// Two-column CSV (actual,forecast); takes precedence over `features`
    #[serde(default)]
    pub features_map: Option<PathBuf>,
    #[serde(default)]
    pub features: Vec<FeaturePair>,
    /// First trading day to produce predictions for
    #[serde(default)]
    pub first_day: Option<NaiveDate>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            train_days: default_train_days(),
            embargo_days: default_embargo_days(),
            weighting: WeightScheme::default(),
            weight_decay: default_weight_decay(),
            target: Target::default(),
            features_map: None,
            features: Vec::new(),
            first_day: None,
        }
    }
}

// ============= Defaults =============

fn default_zone() -> String {
    "Europe/Warsaw".to_owned()
}

fn default_database() -> PathBuf {
    PathBuf::from("settle.db")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_delimiter() -> char {
    ','
}

fn default_forecast_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 15, 0).unwrap_or_default()
}

fn default_forecast_columns() -> Vec<String> {
    [
        "cb_flow_forecast",
        "pv_forecast",
        "wind_forecast",
        "supply_ab1_forecast",
        "demand_forecast",
        "supply_nab_forecast",
        "surplus_capacity_over_reserve",
    ]
    .iter()
    .map(|c| (*c).to_owned())
    .collect()
}

fn default_blend_weight() -> f64 {
    10.0 / 16.0
}

fn default_true() -> bool {
    true
}

fn default_peak_window_days() -> u32 {
    14
}

fn default_peak_shift_days() -> u32 {
    3
}

fn default_top_quantile() -> f64 {
    0.9
}

fn default_bottom_quantile() -> f64 {
    0.1
}

fn default_spike_actual() -> String {
    crate::columns::SUPPLY_AB1_ACTUAL.to_owned()
}

fn default_spike_forecast() -> String {
    crate::columns::SUPPLY_AB1_FORECAST.to_owned()
}

fn default_spike_window_hours() -> i64 {
    24
}

fn default_train_days() -> u32 {
    90
}

fn default_embargo_days() -> u32 {
    3
}

fn default_weight_decay() -> f64 {
    WeightScheme::DEFAULT_DECAY
}
