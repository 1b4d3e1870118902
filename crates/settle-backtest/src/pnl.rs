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

//! Directional trading P&L of the two prediction tracks.
//!
//! A long position buys at the first fixing and settles at the balancing
//! price; a short position does the opposite. Positions are quarter-hour
//! blocks, so the model P&L of a row is a quarter of the price difference.

use settle_core::{Column, Frame, FrameError};
use settle_types::{Target, columns};

/// Whether `prediction` calls for a long position
#[must_use]
pub fn is_long(target: Target, prediction: f64, fixing: f64) -> bool {
    match target {
        Target::BalancingPrice => prediction > fixing,
        Target::Spread => prediction >= 0.0,
    }
}

/// Per-row profit of the position implied by `predictions`
#[must_use]
pub fn profits(
    target: Target,
    predictions: &[Option<f64>],
    balancing: &[Option<f64>],
    fixing: &[Option<f64>],
) -> Column {
    predictions
        .iter()
        .zip(balancing.iter().zip(fixing))
        .map(|(p, (b, f))| {
            let (p, b, f) = ((*p)?, (*b)?, (*f)?);
            Some(if is_long(target, p, f) { b - f } else { f - b })
        })
        .collect()
}

fn difference(a: &[Option<f64>], b: &[Option<f64>]) -> Column {
    a.iter()
        .zip(b)
        .map(|(a, b)| Some((*a)? - (*b)?))
        .collect()
}

/// Add profit, model profit and error columns for both prediction tracks
pub fn add_trading_columns(frame: &mut Frame, target: Target) -> Result<(), FrameError> {
    let balancing = frame.require(columns::BALANCING_PRICE)?;
    let fixing = frame.require(columns::FIXING1_PRICE)?;
    let realised = frame.require(target.column())?;

    let tracks = [
        (
            columns::PREDICTION_ACTUAL,
            columns::PROFIT_ACTUAL,
            columns::MODEL_PROFIT_ACTUAL,
            columns::ERROR_ACTUAL,
        ),
        (
            columns::PREDICTION_FORECAST,
            columns::PROFIT_FORECAST,
            columns::MODEL_PROFIT_FORECAST,
            columns::ERROR_FORECAST,
        ),
    ];

    let mut computed = Vec::new();
    for (prediction, profit, model_profit, error) in tracks {
        let predictions = frame.require(prediction)?;
        let profit_values = profits(target, predictions, balancing, fixing);
        let model_values: Column = profit_values.iter().map(|p| p.map(|v| v / 4.0)).collect();
        computed.push((profit, profit_values));
        computed.push((model_profit, model_values));
        computed.push((error, difference(predictions, realised)));
    }

    for (name, values) in computed {
        frame.insert_column(name, values)?;
    }
    Ok(())
}
