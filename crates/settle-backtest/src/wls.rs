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

//! Weighted least squares with an intercept.
//!
//! Rows are scaled by the square root of their weight and the system is
//! solved through an SVD, so a rank-deficient design yields the minimum-norm
//! solution instead of failing.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use thiserror::Error;

const SINGULAR_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("no training rows")]
    NoRows,

    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{rows} rows but {targets} targets and {weights} weights")]
    LengthMismatch {
        rows: usize,
        targets: usize,
        weights: usize,
    },

    #[error("weight {0} is negative or not finite")]
    InvalidWeight(f64),

    #[error("least-squares solve failed: {0}")]
    Solve(&'static str),

    #[error("fit produced a non-finite coefficient")]
    NonFinite,
}

/// Fitted `y = intercept + sum(coefficients[j] * x[j])`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Prediction for one row; `None` when the row width does not match
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        (features.len() == self.coefficients.len()).then(|| {
            self.intercept
                + self
                    .coefficients
                    .iter()
                    .zip(features)
                    .map(|(c, x)| c * x)
                    .sum::<f64>()
        })
    }
}

pub fn fit_wls(rows: &[Vec<f64>], targets: &[f64], weights: &[f64]) -> Result<LinearModel, ModelError> {
    let n = rows.len();
    if n == 0 {
        return Err(ModelError::NoRows);
    }
    if targets.len() != n || weights.len() != n {
        return Err(ModelError::LengthMismatch {
            rows: n,
            targets: targets.len(),
            weights: weights.len(),
        });
    }
    let width = rows[0].len();
    if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(ModelError::RaggedRow {
            row,
            expected: width,
            actual: r.len(),
        });
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ModelError::InvalidWeight(*w));
    }

    let scale: Vec<f64> = weights.iter().map(|w| w.sqrt()).collect();
    let design = DMatrix::from_fn(n, width + 1, |r, c| {
        let x = if c == 0 { 1.0 } else { rows[r][c - 1] };
        x * scale[r]
    });
    let response = DVector::from_iterator(n, targets.iter().zip(&scale).map(|(y, s)| y * s));

    let solution = design
        .svd(true, true)
        .solve(&response, SINGULAR_EPSILON)
        .map_err(ModelError::Solve)?;
    if solution.iter().any(|b| !b.is_finite()) {
        return Err(ModelError::NonFinite);
    }

    Ok(LinearModel {
        intercept: solution[0],
        coefficients: solution.iter().skip(1).copied().collect(),
    })
}
