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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an upstream data provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Reported value: a number, or a category label with its numeric code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Category { label: String, code: i64 },
}

impl Value {
    /// Numeric view used by the frame; categories contribute their code
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            Self::Category { code, .. } => *code as f64,
        }
    }
}

/// One upstream-reported fact about a delivery instant.
///
/// `sequence` is the row position within the source batch it came from; a
/// later row of the same source and publication instant is a correction of
/// an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub series: String,
    pub delivery: DateTime<Utc>,
    pub published: DateTime<Utc>,
    pub source: SourceId,
    #[serde(default)]
    pub sequence: u64,
    pub value: Value,
}

impl Observation {
    pub fn new(
        series: impl Into<String>,
        delivery: DateTime<Utc>,
        published: DateTime<Utc>,
        source: SourceId,
        value: Value,
    ) -> Self {
        Self {
            series: series.into(),
            delivery,
            published,
            source,
            sequence: 0,
            value,
        }
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_value_exposes_code() {
        let v = Value::Category {
            label: "RECOMMENDED_SAVING".to_owned(),
            code: 2,
        };
        assert!((v.as_f64() - 2.0).abs() < f64::EPSILON);
        assert!((Value::Number(-3.5).as_f64() + 3.5).abs() < f64::EPSILON);
    }
}
