// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.

//! CLI entry point for the Settle pipeline

use anyhow::Result;
use clap::Parser;
use settle_cli::Workspace;
use settle_cli::cli::{
    Cli, Commands, EvaluateArgs, JsonFormatter, ModelOverrides, RunArgs, TableFormatter, TuneArgs,
};
use settle_core::config::load_config;
use settle_core::features::TuningGrid;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = load_config(&cli.config)?;
    let mut workspace = Workspace::open(config)?;

    match cli.command {
        Commands::Ingest => ingest_command(&mut workspace),
        Commands::Merge => merge_command(&mut workspace),
        Commands::Features => features_command(&mut workspace),
        Commands::Train(overrides) => train_command(&mut workspace, &overrides),
        Commands::Evaluate(args) => evaluate_command(&workspace, &args),
        Commands::Validate(args) => {
            let results = workspace.validate(&args.pairs)?;
            println!("{}", TableFormatter::validation(&results));
            Ok(())
        }
        Commands::TunePeakHours(args) => tune_command(&workspace, &args),
        Commands::Run(args) => run_command(&mut workspace, &args),
    }
}

fn ingest_command(workspace: &mut Workspace) -> Result<()> {
    let reports = workspace.ingest()?;
    println!("{}", TableFormatter::datasets(&reports));
    Ok(())
}

fn merge_command(workspace: &mut Workspace) -> Result<()> {
    let reports = workspace.merge()?;
    println!("{}", TableFormatter::merge(&reports));
    Ok(())
}

fn features_command(workspace: &mut Workspace) -> Result<()> {
    let frame = workspace.features()?;
    println!(
        "Final frame: {} rows, {} columns",
        frame.len(),
        frame.column_names().count()
    );
    Ok(())
}

fn train_command(workspace: &mut Workspace, overrides: &ModelOverrides) -> Result<()> {
    overrides.apply(&mut workspace.config_mut().model);
    let report = workspace.train()?;
    print!("{}", TableFormatter::walk_forward(&report));
    Ok(())
}

fn evaluate_command(workspace: &Workspace, args: &EvaluateArgs) -> Result<()> {
    let report = workspace.evaluate()?;
    println!("{}", TableFormatter::evaluation(&report, args.daily));

    let path = workspace.report_path();
    JsonFormatter::write(&report, &path)?;
    info!("Evaluation report written to {}", path.display());
    Ok(())
}

fn tune_command(workspace: &Workspace, args: &TuneArgs) -> Result<()> {
    let grid = TuningGrid {
        window_days: args.window_days.clone(),
        top_offsets: args.top_offsets.clone(),
        bottom_quantiles: args.bottom_quantiles.clone(),
    };
    let cells = workspace.tune_peak_hours(&args.reference, &grid)?;
    println!("{}", TableFormatter::tuning(&cells, args.top));
    Ok(())
}

fn run_command(workspace: &mut Workspace, args: &RunArgs) -> Result<()> {
    ingest_command(workspace)?;
    merge_command(workspace)?;
    features_command(workspace)?;
    if args.skip_model {
        return Ok(());
    }
    train_command(workspace, &args.model)?;
    evaluate_command(workspace, &EvaluateArgs { daily: false })
}
