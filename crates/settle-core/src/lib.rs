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

pub mod adapter;
pub mod asof;
pub mod calendar;
pub mod config;
pub mod features;
pub mod frame;
pub mod pipeline;
pub mod provider;
pub mod resample;
pub mod snapshot;
pub mod stats;
pub mod validation;

pub use adapter::{AdapterOutput, SkipCounts, SourceAdapter};
pub use asof::{
    AsOfEngine, AsOfPolicy, CutoffWindow, Lookback, MergeError, MergeReport, ResolvedPoint,
    ResolvedSeries, SourcePrecedence,
};
pub use calendar::{
    CalendarError, DaySlots, RepeatedStamp, SlotCalendar, localize, localize_sequence,
    map_index_to_utc, slots_for_date,
};
pub use frame::{Column, Frame, FrameError};
pub use pipeline::{DatasetReport, MergeStage, PipelineError, build_features, ingest};
pub use provider::{CsvDirectoryProvider, DatasetProvider, MemoryProvider, Table};
pub use snapshot::{SnapshotStore, export_csv};
pub use validation::{ForecastValidation, validate_forecast};
