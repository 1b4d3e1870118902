// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Forecast-versus-actual accuracy of a column pair.

use serde::Serialize;

use crate::frame::{Frame, FrameError};
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastValidation {
    pub forecast: String,
    pub actual: String,
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// MAE relative to the mean absolute actual value
    pub relative_mae: Option<f64>,
    pub bias: f64,
    /// Bias relative to the mean actual value
    pub bias_pct: Option<f64>,
    pub correlation: Option<f64>,
}

/// Compare `forecast` with `actual` over the rows where both are present.
///
/// Returns `None` when no row has both values.
pub fn validate_forecast(
    frame: &Frame,
    forecast: &str,
    actual: &str,
) -> Result<Option<ForecastValidation>, FrameError> {
    let predicted = frame.require(forecast)?;
    let observed = frame.require(actual)?;

    let pairs: Vec<(f64, f64)> = predicted
        .iter()
        .zip(observed)
        .filter_map(|(f, a)| Some(((*f)?, (*a)?)))
        .collect();
    if pairs.is_empty() {
        return Ok(None);
    }

    let n = pairs.len() as f64;
    let errors: Vec<f64> = pairs.iter().map(|(f, a)| f - a).collect();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
    let bias = errors.iter().sum::<f64>() / n;

    let mean_abs_actual = pairs.iter().map(|(_, a)| a.abs()).sum::<f64>() / n;
    let mean_actual = pairs.iter().map(|(_, a)| a).sum::<f64>() / n;

    Ok(Some(ForecastValidation {
        forecast: forecast.to_owned(),
        actual: actual.to_owned(),
        count: pairs.len(),
        mae,
        rmse,
        relative_mae: (mean_abs_actual > 0.0).then(|| mae / mean_abs_actual),
        bias,
        bias_pct: (mean_actual != 0.0).then(|| bias / mean_actual * 100.0),
        correlation: stats::pearson(predicted, observed),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    #[test]
    fn test_validation_metrics() {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut frame = Frame::from_points(
            "demand_actual",
            (0..4).map(|i| (start + TimeDelta::minutes(15 * i), [10.0, 20.0, 30.0, 40.0][usize::try_from(i).unwrap()])),
        )
        .unwrap();
        frame
            .insert_column(
                "demand_forecast",
                vec![Some(12.0), Some(18.0), Some(34.0), None],
            )
            .unwrap();

        let v = validate_forecast(&frame, "demand_forecast", "demand_actual")
            .unwrap()
            .unwrap();
        assert_eq!(v.count, 3);
        assert!((v.mae - 8.0 / 3.0).abs() < 1e-12);
        assert!((v.bias - 4.0 / 3.0).abs() < 1e-12);
        assert!((v.rmse - (24.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((v.relative_mae.unwrap() - (8.0 / 3.0) / 20.0).abs() < 1e-12);
        assert!((v.bias_pct.unwrap() - (4.0 / 3.0) / 20.0 * 100.0).abs() < 1e-9);
        assert!(v.correlation.unwrap() > 0.95);
    }

    #[test]
    fn test_no_overlap() {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut frame = Frame::from_points("a", [(start, 1.0)]).unwrap();
        frame.insert_column("f", vec![None]).unwrap();
        assert_eq!(validate_forecast(&frame, "f", "a").unwrap(), None);
        assert!(validate_forecast(&frame, "missing", "a").is_err());
    }
}
