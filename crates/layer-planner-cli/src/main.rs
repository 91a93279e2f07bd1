//! Command-line driver for the layer path planner.
//!
//! Reads a machine/material profile and a path-config bundle (both TOML) plus
//! a JSON description of one layer's geometry, runs it through
//! [`layer_planner::queue::Planner`], and writes the resulting G-code-like
//! text to stdout or a file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use layer_planner::{Planner, TextGcodeSink, VisibilityRouter};
use path_types::{ConfigRef, IntPoint, Polygon};
use print_profile::{ConfigSettings, PathConfigBundle};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "layer-planner", version, about = "Per-layer path planner demo driver")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan one layer and emit the resulting moves.
    Plan {
        /// JSON file describing the layer's geometry and operations.
        #[arg(long)]
        layer: PathBuf,
        /// TOML machine/material settings (print_profile::ConfigSettings).
        #[arg(long)]
        settings: PathBuf,
        /// TOML path-config bundle (print_profile::PathConfigBundle).
        #[arg(long)]
        configs: PathBuf,
        /// Write output here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Layer thickness in micrometres, used only by the spiralize Z ramp.
        #[arg(long, default_value_t = 200_000)]
        layer_thickness: i64,
    },
    /// Check that a settings file parses and satisfies its invariants.
    ValidateSettings {
        #[arg(long)]
        settings: PathBuf,
    },
}

/// One layer's geometry and the sequence of planner operations to run
/// against it, as loaded from `--layer`.
#[derive(Debug, Deserialize)]
struct LayerPlan {
    layer_index: u32,
    layer_z: i64,
    entry_position: [i64; 2],
    current_extruder: u32,
    /// Inside-boundary polygon set. Empty means no router is bound and
    /// every travel goes direct.
    #[serde(default)]
    boundary: Vec<Vec<[i64; 2]>>,
    operations: Vec<Operation>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Operation {
    Polygon {
        role: String,
        points: Vec<[i64; 2]>,
        #[serde(default)]
        start_index: usize,
    },
    PolygonsByOptimizer {
        role: String,
        polygons: Vec<Vec<[i64; 2]>>,
        #[serde(default)]
        route_through_boundary: bool,
    },
    Travel {
        point: [i64; 2],
        #[serde(default)]
        force_unique: bool,
    },
    Fan {
        percent: i32,
        role: String,
    },
    ForceRetract,
    SetExtruder {
        extruder: u32,
    },
}

fn to_point(p: [i64; 2]) -> IntPoint {
    IntPoint::new(p[0], p[1])
}

fn to_polygon(points: &[[i64; 2]]) -> Polygon {
    points.iter().copied().map(to_point).collect()
}

fn run_plan(
    layer: PathBuf,
    settings: PathBuf,
    configs: PathBuf,
    output: Option<PathBuf>,
    layer_thickness: i64,
) -> Result<()> {
    let settings = ConfigSettings::from_file(&settings)
        .with_context(|| format!("loading settings from {}", settings.display()))?;
    settings.validate().context("settings failed validation")?;

    let bundle = PathConfigBundle::from_file(&configs)
        .with_context(|| format!("loading path configs from {}", configs.display()))?;

    let contents =
        fs::read_to_string(&layer).with_context(|| format!("reading layer plan {}", layer.display()))?;
    let plan: LayerPlan =
        serde_json::from_str(&contents).with_context(|| format!("parsing layer plan {}", layer.display()))?;

    let boundary: Vec<Polygon> = plan.boundary.iter().map(|p| to_polygon(p)).collect();
    let router = VisibilityRouter::new();

    let mut planner = Planner::new(
        plan.layer_z,
        to_point(plan.entry_position),
        settings.travel_speed_mm_s,
        settings.retract_min_um,
        plan.current_extruder,
    );

    if !boundary.is_empty() {
        planner.set_router(&router, boundary.clone(), plan.layer_index);
    }

    // One fresh `ConfigRef` per role per run keeps every role's paths
    // folding together under identity equality, matching how an upstream
    // driver is expected to bind configs once.
    let mut role_config = |role: &str| -> Result<ConfigRef> {
        bundle
            .build(role)
            .map(ConfigRef::from)
            .with_context(|| format!("unknown path-config role {role:?}"))
    };

    for op in plan.operations {
        match op {
            Operation::Polygon { role, points, start_index } => {
                let cfg = role_config(&role)?;
                let poly = to_polygon(&points);
                planner.queue_polygon(&poly, start_index, cfg)?;
            }
            Operation::PolygonsByOptimizer { role, polygons, route_through_boundary } => {
                let cfg = role_config(&role)?;
                let polys: Vec<Polygon> = polygons.iter().map(|p| to_polygon(p)).collect();
                let router_and_boundary =
                    if route_through_boundary && !boundary.is_empty() {
                        Some((&router as &dyn layer_planner::Router, &boundary))
                    } else {
                        None
                    };
                planner.queue_polygons_by_optimizer(&polys, router_and_boundary, cfg, plan.layer_index)?;
            }
            Operation::Travel { point, force_unique } => {
                planner.queue_travel(to_point(point), force_unique)?;
            }
            Operation::Fan { percent, role } => {
                let cfg = role_config(&role)?;
                planner.queue_fan(percent, cfg);
            }
            Operation::ForceRetract => planner.force_retract(),
            Operation::SetExtruder { extruder } => planner.set_extruder(extruder),
        }
    }

    planner.finalize_layer(&settings, plan.layer_index)?;

    let mut sink = TextGcodeSink::default();
    planner.emit(&mut sink, layer_thickness, settings.perimeter_overlap_ratio);

    let text = sink.lines().join("\n");
    match output {
        Some(path) => {
            fs::write(&path, text).with_context(|| format!("writing output to {}", path.display()))?;
            info!(path = %path.display(), "wrote layer output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run_validate_settings(settings: PathBuf) -> Result<()> {
    let settings = ConfigSettings::from_file(&settings)
        .with_context(|| format!("loading settings from {}", settings.display()))?;
    settings.validate().context("settings failed validation")?;
    println!("settings OK");
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Plan { layer, settings, configs, output, layer_thickness } => {
            run_plan(layer, settings, configs, output, layer_thickness)
        }
        Commands::ValidateSettings { settings } => run_validate_settings(settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plan_subcommand() {
        let cli = Cli::parse_from([
            "layer-planner",
            "plan",
            "--layer",
            "layer.json",
            "--settings",
            "settings.toml",
            "--configs",
            "configs.toml",
        ]);
        match cli.command {
            Commands::Plan { layer, settings, configs, output, layer_thickness } => {
                assert_eq!(layer, PathBuf::from("layer.json"));
                assert_eq!(settings, PathBuf::from("settings.toml"));
                assert_eq!(configs, PathBuf::from("configs.toml"));
                assert!(output.is_none());
                assert_eq!(layer_thickness, 200_000);
            }
            other => panic!("expected Plan, got {other:?}"),
        }
    }

    #[test]
    fn parses_validate_settings_subcommand() {
        let cli = Cli::parse_from(["layer-planner", "validate-settings", "--settings", "settings.toml"]);
        assert!(matches!(cli.command, Commands::ValidateSettings { .. }));
    }

    #[test]
    fn layer_plan_parses_from_json() {
        let json = r#"{
            "layer_index": 0,
            "layer_z": 200000,
            "entry_position": [0, 0],
            "current_extruder": 0,
            "boundary": [],
            "operations": [
                {"op": "polygon", "role": "WALL-OUTER", "points": [[0,0],[1000,0],[1000,1000],[0,1000]]},
                {"op": "fan", "percent": 100, "role": "SKIN"},
                {"op": "force_retract"},
                {"op": "set_extruder", "extruder": 1}
            ]
        }"#;
        let plan: LayerPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.operations.len(), 4);
        assert_eq!(plan.layer_z, 200_000);
    }
}
