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

//! Shared value types for the Settle reconciliation pipeline.
//!
//! Everything here is plain data: observations as reported upstream, slot
//! granularity and ambiguity flags for the calendar mapper, model settings,
//! and the TOML configuration tree read by the `settle` binary.

pub mod columns;
pub mod config;
pub mod error;
pub mod model;
pub mod observation;
pub mod time;

pub use config::*;
pub use error::ConfigError;
pub use model::{Target, WeightScheme};
pub use observation::{Observation, SourceId, Value};
pub use time::{Ambiguity, CutoffBound, DayKind, Granularity};
