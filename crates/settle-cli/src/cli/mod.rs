// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! CLI module for the `settle` command-line interface.

pub mod args;
pub mod formatters;

pub use args::{
    Cli, Commands, EvaluateArgs, ModelOverrides, RunArgs, TuneArgs, ValidateArgs,
};
pub use formatters::{JsonFormatter, TableFormatter};
