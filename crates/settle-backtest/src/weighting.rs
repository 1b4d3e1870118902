// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

use settle_types::WeightScheme;

/// Sample weights for `n` training rows ordered oldest first
#[must_use]
pub fn weights(scheme: WeightScheme, n: usize) -> Vec<f64> {
    let len = n as f64;
    (0..n)
        .map(|i| {
            let i = i as f64;
            match scheme {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Linear => (i + 1.0) / len,
                WeightScheme::Exponential { decay } => (-decay * (len - 1.0 - i) / len).exp(),
            }
        })
        .collect()
}
