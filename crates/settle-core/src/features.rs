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

//! Derived trading features on the quarter-hour frame.
//!
//! ## Peak-hour state
//!
//! The residual load (demand minus wind and solar) is compared against
//! rolling top/bottom quantile bands. The bands are computed over a trailing
//! multi-week window of actuals and shifted forward by a guard period, so the
//! threshold used on day D only uses data that was published well before D.
//! The same bands classify the forecast residual.
//!
//! ## Supply spikes
//!
//! Values of the supply column above its trailing one-day top quantile (or
//! below the bottom quantile) are kept, everything else becomes zero.

use chrono::TimeDelta;
use serde::Serialize;
use settle_types::columns;
use settle_types::{PeakHoursConfig, SupplySpikeConfig};
use tracing::debug;

use crate::frame::{Column, Frame, FrameError};
use crate::stats;

/// Quarter-hours per UTC day on a regular grid
const QUARTERS_PER_DAY: usize = 96;

/// Load state derived from the residual-load bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PeakState {
    OffPeak,
    Normal,
    Peak,
}

impl PeakState {
    #[must_use]
    pub const fn code(self) -> f64 {
        match self {
            Self::OffPeak => 0.0,
            Self::Normal => 1.0,
            Self::Peak => 2.0,
        }
    }

    #[must_use]
    pub fn classify(signal: f64, top: f64, bottom: f64) -> Self {
        if signal < bottom {
            Self::OffPeak
        } else if signal > top {
            Self::Peak
        } else {
            Self::Normal
        }
    }
}

/// Rolling classification bands aligned with the frame rows
#[derive(Debug, Clone, PartialEq)]
pub struct PeakBands {
    pub top: Column,
    pub bottom: Column,
}

impl PeakBands {
    /// Quantile bands over `window` rows, shifted `guard` rows later
    #[must_use]
    pub fn compute(
        signal: &[Option<f64>],
        window: usize,
        guard: usize,
        top_quantile: f64,
        bottom_quantile: f64,
    ) -> Self {
        Self {
            top: stats::shift(&stats::rolling_quantile(signal, window, top_quantile), guard),
            bottom: stats::shift(
                &stats::rolling_quantile(signal, window, bottom_quantile),
                guard,
            ),
        }
    }

    /// State codes of `signal`; rows without a signal or band stay empty
    #[must_use]
    pub fn classify(&self, signal: &[Option<f64>]) -> Column {
        signal
            .iter()
            .zip(self.top.iter().zip(&self.bottom))
            .map(|(s, (top, bottom))| {
                Some(PeakState::classify((*s)?, (*top)?, (*bottom)?).code())
            })
            .collect()
    }
}

/// `minuend - (a + b)` per row
fn residual(minuend: &[Option<f64>], a: &[Option<f64>], b: &[Option<f64>]) -> Column {
    minuend
        .iter()
        .zip(a.iter().zip(b))
        .map(|(m, (a, b))| Some((*m)? - ((*a)? + (*b)?)))
        .collect()
}

fn sum_columns(a: &[Option<f64>], b: &[Option<f64>]) -> Column {
    a.iter()
        .zip(b)
        .map(|(a, b)| Some((*a)? + (*b)?))
        .collect()
}

/// Add the actual and forecast peak-hour classification.
///
/// The frame must be on a regular quarter-hour grid.
pub fn add_peak_hours(frame: &mut Frame, config: &PeakHoursConfig) -> Result<(), FrameError> {
    let window = config.window_days as usize * QUARTERS_PER_DAY;
    let guard = config.shift_days as usize * QUARTERS_PER_DAY;

    let clean_actual = sum_columns(
        frame.require(columns::WIND_ACTUAL)?,
        frame.require(columns::PV_ACTUAL)?,
    );
    let residual_actual = residual(
        frame.require(columns::DEMAND_ACTUAL)?,
        frame.require(columns::WIND_ACTUAL)?,
        frame.require(columns::PV_ACTUAL)?,
    );
    let residual_forecast = residual(
        frame.require(columns::DEMAND_KSE_FORECAST)?,
        frame.require(columns::WIND_FORECAST_INTERPOLATED)?,
        frame.require(columns::PV_FORECAST_INTERPOLATED)?,
    );

    let bands = PeakBands::compute(
        &residual_actual,
        window,
        guard,
        config.top_quantile,
        config.bottom_quantile,
    );
    let actual_state = bands.classify(&residual_actual);
    let forecast_state = bands.classify(&residual_forecast);

    debug!(
        "Peak hours: {} of {} rows classified from actuals",
        actual_state.iter().flatten().count(),
        frame.len()
    );

    frame.insert_column(columns::GENERATION_CLEAN_ACTUAL, clean_actual)?;
    frame.insert_column(columns::RESIDUAL_ACTUAL, residual_actual)?;
    frame.insert_column(columns::RESIDUAL_FORECAST, residual_forecast)?;
    frame.insert_column(columns::PEAK_TOP_BAND, bands.top)?;
    frame.insert_column(columns::PEAK_BOTTOM_BAND, bands.bottom)?;
    frame.insert_column(columns::PEAK_HOURS_CALC_ACTUAL, actual_state)?;
    frame.insert_column(columns::PEAK_HOURS_CALC_FORECAST, forecast_state)?;
    Ok(())
}

/// `value` where it lies beyond `band` in the given direction, else zero
fn spike_marker(values: &[Option<f64>], band: &[Option<f64>], above: bool) -> Column {
    values
        .iter()
        .zip(band)
        .map(|(v, b)| match (v, b) {
            (Some(v), Some(b)) if (above && v > b) || (!above && v < b) => Some(*v),
            _ => Some(0.0),
        })
        .collect()
}

/// Add supply spike markers for the actual and forecast supply columns
pub fn add_supply_spikes(frame: &mut Frame, config: &SupplySpikeConfig) -> Result<(), FrameError> {
    let span = TimeDelta::hours(config.window_hours);
    let targets = [
        (&config.actual, columns::SUPPLY_TOP, columns::SUPPLY_BOTTOM),
        (
            &config.forecast,
            columns::SUPPLY_TOP_FORECAST,
            columns::SUPPLY_BOTTOM_FORECAST,
        ),
    ];

    for (source, top_name, bottom_name) in targets {
        let values = frame.require(source)?;
        let top_band =
            stats::rolling_quantile_by_time(frame.index(), values, span, config.top_quantile);
        let bottom_band =
            stats::rolling_quantile_by_time(frame.index(), values, span, config.bottom_quantile);

        let top = spike_marker(values, &top_band, true);
        let bottom = spike_marker(values, &bottom_band, false);
        frame.insert_column(top_name, top)?;
        frame.insert_column(bottom_name, bottom)?;
    }
    Ok(())
}

/// One cell of the peak-hour threshold grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningCell {
    pub window_days: u32,
    pub top_quantile: f64,
    pub bottom_quantile: f64,
    pub correlation: Option<f64>,
}

/// Grid of band parameters to score
#[derive(Debug, Clone, PartialEq)]
pub struct TuningGrid {
    pub window_days: Vec<u32>,
    /// Distances of the top quantile from 1.0, e.g. 0.15 -> top 0.85
    pub top_offsets: Vec<f64>,
    pub bottom_quantiles: Vec<f64>,
}

/// Score band parameters by how well the forecast-residual classification
/// correlates with a reference state column (the published peak-hour state).
///
/// Bands here are computed from the forecast residual itself, without a
/// guard shift, which mirrors what is known when the state is published.
pub fn tune_peak_hours(
    frame: &Frame,
    reference: &str,
    grid: &TuningGrid,
) -> Result<Vec<TuningCell>, FrameError> {
    let reference = frame.require(reference)?;
    let signal = residual(
        frame.require(columns::DEMAND_KSE_FORECAST)?,
        frame.require(columns::WIND_ACTUAL)?,
        frame.require(columns::PV_ACTUAL)?,
    );

    let mut cells = Vec::new();
    for &days in &grid.window_days {
        let window = days as usize * QUARTERS_PER_DAY;
        for &offset in &grid.top_offsets {
            for &bottom in &grid.bottom_quantiles {
                let top = 1.0 - offset;
                let bands = PeakBands::compute(&signal, window, 0, top, bottom);
                let states = bands.classify(&signal);
                cells.push(TuningCell {
                    window_days: days,
                    top_quantile: top,
                    bottom_quantile: bottom,
                    correlation: stats::pearson(&states, reference),
                });
            }
        }
    }

    cells.sort_by(|a, b| {
        b.correlation
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.correlation.unwrap_or(f64::NEG_INFINITY))
    });
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn grid(n: usize) -> Vec<DateTime<Utc>> {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        (0..n)
            .map(|i| start + TimeDelta::minutes(15 * i64::try_from(i).unwrap()))
            .collect()
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(PeakState::classify(10.0, 8.0, 2.0), PeakState::Peak);
        assert_eq!(PeakState::classify(1.0, 8.0, 2.0), PeakState::OffPeak);
        assert_eq!(PeakState::classify(8.0, 8.0, 2.0), PeakState::Normal);
        assert!((PeakState::Peak.code() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bands_only_use_data_before_guard() {
        let signal: Vec<Option<f64>> = (0..10).map(|i| Some(f64::from(i))).collect();
        let bands = PeakBands::compute(&signal, 3, 2, 1.0, 0.0);

        // Row 6 uses the window of rows 2..=4
        assert_eq!(bands.top[6], Some(4.0));
        assert_eq!(bands.bottom[6], Some(2.0));
        assert_eq!(bands.top[3], None);
        assert_eq!(bands.top[4], Some(2.0));
    }

    #[test]
    fn test_classification_leaves_missing_rows_empty() {
        let bands = PeakBands {
            top: vec![Some(5.0), None, Some(5.0)],
            bottom: vec![Some(1.0), Some(1.0), Some(1.0)],
        };
        let states = bands.classify(&[Some(6.0), Some(6.0), None]);
        assert_eq!(states, vec![Some(2.0), None, None]);
    }

    #[test]
    fn test_peak_hours_on_frame() {
        let n = 96 * 5;
        let mut frame = Frame::with_index(grid(n)).unwrap();
        let demand: Column = (0..n).map(|i| Some(1000.0 + f64::from(u32::try_from(i % 96).unwrap()))).collect();
        frame.insert_column(columns::DEMAND_ACTUAL, demand.clone()).unwrap();
        frame.insert_column(columns::WIND_ACTUAL, vec![Some(100.0); n]).unwrap();
        frame.insert_column(columns::PV_ACTUAL, vec![Some(0.0); n]).unwrap();
        frame.insert_column(columns::DEMAND_KSE_FORECAST, demand).unwrap();
        frame
            .insert_column(columns::WIND_FORECAST_INTERPOLATED, vec![Some(100.0); n])
            .unwrap();
        frame
            .insert_column(columns::PV_FORECAST_INTERPOLATED, vec![Some(0.0); n])
            .unwrap();

        let config = PeakHoursConfig {
            enabled: true,
            window_days: 1,
            shift_days: 1,
            top_quantile: 0.9,
            bottom_quantile: 0.1,
        };
        add_peak_hours(&mut frame, &config).unwrap();

        let actual = frame.column(columns::PEAK_HOURS_CALC_ACTUAL).unwrap();
        let forecast = frame.column(columns::PEAK_HOURS_CALC_FORECAST).unwrap();
        // First full window ends at row 95, shifted by one day
        assert_eq!(actual[190], None);
        assert_eq!(actual[191], Some(2.0));
        assert_eq!(actual[192], Some(0.0));
        assert_eq!(actual[192 + 48], Some(1.0));
        assert_eq!(actual[192 + 95], Some(2.0));
        assert_eq!(actual, forecast);
    }

    #[test]
    fn test_supply_spikes_mark_extremes() {
        let n = 8;
        let mut frame = Frame::with_index(grid(n)).unwrap();
        let supply = vec![
            Some(10.0),
            Some(10.0),
            Some(10.0),
            Some(50.0),
            Some(10.0),
            Some(-20.0),
            Some(10.0),
            None,
        ];
        frame.insert_column(columns::SUPPLY_AB1_ACTUAL, supply.clone()).unwrap();
        frame.insert_column(columns::SUPPLY_AB1_FORECAST, supply).unwrap();

        add_supply_spikes(&mut frame, &SupplySpikeConfig::default()).unwrap();

        let top = frame.column(columns::SUPPLY_TOP).unwrap();
        let bottom = frame.column(columns::SUPPLY_BOTTOM).unwrap();
        assert_eq!(top[3], Some(50.0));
        assert_eq!(top[4], Some(0.0));
        assert_eq!(bottom[5], Some(-20.0));
        assert_eq!(bottom[7], Some(0.0));
        assert_eq!(
            frame.column(columns::SUPPLY_TOP_FORECAST).unwrap(),
            top
        );
    }

    #[test]
    fn test_tuning_ranks_best_cell_first() {
        let n = 96 * 3;
        let mut frame = Frame::with_index(grid(n)).unwrap();
        let demand: Column = (0..n).map(|i| Some(f64::from(u32::try_from(i % 96).unwrap()))).collect();
        let published: Column = (0..n)
            .map(|i| {
                let slot = i % 96;
                Some(if slot >= 80 { 2.0 } else if slot < 16 { 0.0 } else { 1.0 })
            })
            .collect();
        frame.insert_column(columns::DEMAND_KSE_FORECAST, demand).unwrap();
        frame.insert_column(columns::WIND_ACTUAL, vec![Some(0.0); n]).unwrap();
        frame.insert_column(columns::PV_ACTUAL, vec![Some(0.0); n]).unwrap();
        frame
            .insert_column(columns::PEAK_HOURS_PUBLISHED, published)
            .unwrap();

        let cells = tune_peak_hours(
            &frame,
            columns::PEAK_HOURS_PUBLISHED,
            &TuningGrid {
                window_days: vec![1],
                top_offsets: vec![0.5, 0.17],
                bottom_quantiles: vec![0.17],
            },
        )
        .unwrap();

        assert_eq!(cells.len(), 2);
        assert!((cells[0].top_quantile - 0.83).abs() < 1e-12);
        assert!(cells[0].correlation.unwrap() > cells[1].correlation.unwrap());
    }
}
