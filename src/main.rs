//! Renewable planner entry point: CLI wiring, logging, and output files.

use std::path::Path;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use renewable_planner::cli::CliArgs;
use renewable_planner::config::PlannerConfig;
use renewable_planner::io::export::{export_json, export_pue_csv, export_resource_csv};
use renewable_planner::pipeline::{Orchestrator, PipelineResult};

/// Logs go to stderr so stdout carries only the report.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_outputs(cli: &CliArgs, result: &PipelineResult) -> Result<(), String> {
    if let Some(path) = &cli.output {
        export_json(result, path).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        info!(path = %path.display(), "result written");
    }
    if let Some(path) = &cli.profile_out {
        match result.stages.pue.payload() {
            Some(profile) => export_pue_csv(profile, path)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?,
            None => return Err("no PUE profile to export".to_string()),
        }
    }
    if let Some(path) = &cli.resource_out {
        match result.stages.planner.payload() {
            Some(plan) => export_resource_csv(&plan.series, path)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?,
            None => return Err("no resource series to export".to_string()),
        }
    }
    Ok(())
}

fn main() {
    init_logging();
    let cli = CliArgs::parse();

    let mut config = match &cli.config {
        Some(path) => PlannerConfig::from_toml_file(Path::new(path)).unwrap_or_else(|e| {
            error!("{e}");
            process::exit(1);
        }),
        None => PlannerConfig::default(),
    };
    if cli.offline {
        config.resource.offline = true;
    }

    let mut request = cli.load_request().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    if let Some(seed) = cli.seed {
        config.sensitivity.seed = seed;
        if let Some(s) = request.sensitivity.as_mut() {
            s.seed = Some(seed);
        }
    }

    let orchestrator = Orchestrator::from_config(config).unwrap_or_else(|e| {
        error!("failed to initialize resource source: {e}");
        process::exit(1);
    });
    let result = orchestrator.run(&request).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    println!("{result}");

    if let Err(e) = write_outputs(&cli, &result) {
        error!("{e}");
        process::exit(1);
    }
    if !result.success {
        process::exit(1);
    }
}
