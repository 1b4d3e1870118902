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

//! Walk-forward model settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::columns;
use crate::error::ConfigError;

/// Sample weighting over a training window, oldest sample first.
///
/// Both non-uniform schemes give the most recent sample the largest weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WeightScheme {
    Uniform,
    Linear,
    /// `w_i = exp(-decay * (n - 1 - i) / n)`
    Exponential { decay: f64 },
}

impl WeightScheme {
    pub const DEFAULT_DECAY: f64 = 1.0;

    #[must_use]
    pub fn with_decay(self, decay: f64) -> Self {
        match self {
            Self::Exponential { .. } => Self::Exponential { decay },
            other @ (Self::Uniform | Self::Linear) => other,
        }
    }
}

impl Default for WeightScheme {
    fn default() -> Self {
        Self::Exponential {
            decay: Self::DEFAULT_DECAY,
        }
    }
}

impl FromStr for WeightScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "uniform" => Ok(Self::Uniform),
            "linear" => Ok(Self::Linear),
            "exp" | "exponential" => Ok(Self::default()),
            other => Err(ConfigError::UnknownWeightScheme(other.to_owned())),
        }
    }
}

impl TryFrom<String> for WeightScheme {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeightScheme> for String {
    fn from(value: WeightScheme) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WeightScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => write!(f, "none"),
            Self::Linear => write!(f, "linear"),
            Self::Exponential { .. } => write!(f, "exp"),
        }
    }
}

/// Quantity the model predicts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// Balancing market settlement price
    #[default]
    BalancingPrice,
    /// Settlement price minus the first day-ahead fixing price
    Spread,
}

impl Target {
    /// Frame column holding the realised target
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::BalancingPrice => columns::BALANCING_PRICE,
            Self::Spread => columns::SPREAD,
        }
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bilans_price" => Ok(Self::BalancingPrice),
            "spread" => Ok(Self::Spread),
            other => Err(ConfigError::UnknownTarget(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Target {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Target> for String {
    fn from(value: Target) -> Self {
        value.column().to_owned()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
