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

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Width of a sub-day time slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    #[default]
    QuarterHour,
}

impl Granularity {
    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::Hour => 60,
            Self::QuarterHour => 15,
        }
    }

    #[must_use]
    pub const fn slots_per_hour(self) -> usize {
        match self {
            Self::Hour => 1,
            Self::QuarterHour => 4,
        }
    }

    /// Slot count of a day without a daylight-saving transition
    #[must_use]
    pub const fn slots_per_standard_day(self) -> usize {
        24 * self.slots_per_hour()
    }

    #[must_use]
    pub fn step(self) -> TimeDelta {
        TimeDelta::minutes(self.minutes())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hour => write!(f, "hour"),
            Self::QuarterHour => write!(f, "quarter_hour"),
        }
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "h" | "1h" | "60min" => Ok(Self::Hour),
            "quarter_hour" | "15min" | "quarter" => Ok(Self::QuarterHour),
            other => Err(ConfigError::UnknownGranularity(other.to_owned())),
        }
    }
}

/// How a repeated local wall-clock time (fall-back hour) is resolved.
///
/// `Infer` resolves chronologically: when a sequence of timestamps is
/// available the first occurrence is the earlier instant and a backwards
/// step of the wall clock switches to the later one. A lone timestamp
/// resolves to the earlier instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ambiguity {
    Earlier,
    Later,
    #[default]
    Infer,
}

impl FromStr for Ambiguity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earlier" | "first" => Ok(Self::Earlier),
            "later" | "second" => Ok(Self::Later),
            "infer" => Ok(Self::Infer),
            other => Err(ConfigError::UnknownAmbiguity(other.to_owned())),
        }
    }
}

/// Day length class caused by daylight-saving transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
    /// Spring-forward day (23 hours)
    Short,
    Standard,
    /// Fall-back day (25 hours)
    Long,
}

/// Whether a publication exactly at the daily cutoff still counts as known
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffBound {
    #[default]
    Inclusive,
    Exclusive,
}
