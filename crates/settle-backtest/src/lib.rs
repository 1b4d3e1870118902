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

//! Settle backtesting engine
//!
//! Turns the final feature frame into day-by-day out-of-sample predictions
//! and scores them as a directional trading strategy.
//!
//! ## Stages
//!
//! - **Walk-forward**: weighted least squares refitted for every trading day
//!   on an embargoed history window
//! - **P&L**: long/short decision per quarter-hour against the first fixing
//! - **Evaluation**: win rate, P&L, error and drawdown per prediction track

pub mod features_map;
pub mod metrics;
pub mod pnl;
pub mod walkforward;
pub mod weighting;
pub mod wls;

pub use features_map::{load_features_map, read_features_map};
pub use metrics::{DailyError, EvaluationReport, TrackMetrics, evaluate};
pub use pnl::add_trading_columns;
pub use walkforward::{
    DayOutcome, DayStatus, TrainingWindow, WalkForwardConfig, WalkForwardReport, run_walk_forward,
};
pub use wls::{LinearModel, ModelError, fit_wls};
