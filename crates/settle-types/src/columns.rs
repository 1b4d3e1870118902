// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! Canonical series names shared between pipeline stages.

pub const DEMAND_ACTUAL: &str = "demand_actual";
pub const DEMAND_KSE_FORECAST: &str = "demand_kse_forecast";
pub const WIND_ACTUAL: &str = "wind_actual";
pub const PV_ACTUAL: &str = "pv_actual";
pub const WIND_FORECAST_INTERPOLATED: &str = "wind_forecast_interpolate";
pub const PV_FORECAST_INTERPOLATED: &str = "pv_forecast_interpolate";
pub const SUPPLY_AB1_ACTUAL: &str = "supply_ab1_actual";
pub const SUPPLY_AB1_FORECAST: &str = "supply_ab1_forecast";

pub const BALANCING_PRICE: &str = "bilans_price";
pub const FIXING1_PRICE: &str = "fixing1_price";
pub const SPREAD: &str = "spread";

/// Published peak-hour state (0 recommended usage .. 3 usage limit required)
pub const PEAK_HOURS_PUBLISHED: &str = "peak_hours_actual";
pub const GENERATION_CLEAN_ACTUAL: &str = "generation_clean_actual";
pub const RESIDUAL_ACTUAL: &str = "demand-generation-clean_actual";
pub const RESIDUAL_FORECAST: &str = "demand-generation-clean_forecast";
pub const PEAK_TOP_BAND: &str = "peak_hours_top_actual";
pub const PEAK_BOTTOM_BAND: &str = "peak_hours_bottom_actual";
pub const PEAK_HOURS_CALC_ACTUAL: &str = "peak_hours_calc_actual";
pub const PEAK_HOURS_CALC_FORECAST: &str = "peak_hours_calc_forecast";

pub const SUPPLY_TOP: &str = "supply_top";
pub const SUPPLY_BOTTOM: &str = "supply_bottom";
pub const SUPPLY_TOP_FORECAST: &str = "supply_top_forecast";
pub const SUPPLY_BOTTOM_FORECAST: &str = "supply_bottom_forecast";

pub const PREDICTION_ACTUAL: &str = "prediction_actual";
pub const PREDICTION_FORECAST: &str = "prediction_forecast";
pub const PROFIT_ACTUAL: &str = "profit_actual";
pub const PROFIT_FORECAST: &str = "profit_forecast";
pub const MODEL_PROFIT_ACTUAL: &str = "model_profit_actual";
pub const MODEL_PROFIT_FORECAST: &str = "model_profit_forecast";
pub const ERROR_ACTUAL: &str = "error_actual";
pub const ERROR_FORECAST: &str = "error_forecast";
pub const COEF_CONST: &str = "coef_const";

/// Suffix of the blended (two-horizon) forecast column.
pub const FIX_SUFFIX: &str = "_fix";
/// Suffix of the linearly interpolated forecast column.
pub const INTERPOLATE_SUFFIX: &str = "_interpolate";

/// Coefficient column name for a model feature.
#[must_use]
pub fn coefficient(feature: &str) -> String {
    format!("coef_{feature}")
}
