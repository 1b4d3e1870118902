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

//! Configuration errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown weighting scheme '{0}' (expected none, linear or exp)")]
    UnknownWeightScheme(String),

    #[error("unknown prediction target '{0}' (expected bilans_price or spread)")]
    UnknownTarget(String),

    #[error("unknown slot granularity '{0}' (expected hour or quarter_hour)")]
    UnknownGranularity(String),

    #[error("unknown ambiguity flag '{0}' (expected earlier, later or infer)")]
    UnknownAmbiguity(String),

    #[error("invalid time zone '{0}'")]
    InvalidTimeZone(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
