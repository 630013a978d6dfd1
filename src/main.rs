//! castline - casting-line operating standards engine
//!
//! Predicts an outcome and its ensemble uncertainty from operating
//! parameters, simulates parameter grids, and searches for per-grade
//! operating standards.
//!
//! # Usage
//!
//! ```bash
//! # Interactive single-point prediction with explanations
//! castline --artifact model.json predict
//!
//! # Grid simulation towards a target speed
//! castline simulate --target 200 --points 8 --axis Temp --axis Pressure
//!
//! # Per-grade standards table
//! castline optimize --trials 200 --output standards.csv
//! ```
//!
//! # Environment Variables
//!
//! - `CASTLINE_CONFIG`: Path to the engine config TOML
//! - `CASTLINE_ARTIFACT`: Path to the model artifact JSON
//! - `RUST_LOG`: Logging level (default: info)

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use castline::config::defaults;
use castline::model::{FeatureLayout, ParamKind};
use castline::report;
use castline::{Engine, EngineConfig, ModelArtifact, ParamRecord};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "castline")]
#[command(about = "Ensemble-tree prediction, grid simulation and operating standards search")]
#[command(version)]
struct CliArgs {
    /// Engine config TOML (default: $CASTLINE_CONFIG, then ./castline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model artifact JSON (overrides [model] artifact_path)
    #[arg(long, global = true, env = "CASTLINE_ARTIFACT")]
    artifact: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Prompt for operating parameters and explain each prediction
    Predict,

    /// Evaluate the ensemble over a grid of numeric parameters
    Simulate {
        /// Outcome the error column is measured against
        #[arg(long)]
        target: Option<f64>,
        /// Values per gridded parameter
        #[arg(long)]
        points: Option<usize>,
        /// Gridded parameter (repeatable; default: every numeric parameter)
        #[arg(long = "axis", value_name = "NAME")]
        axes: Vec<String>,
        /// CSV output path
        #[arg(long, default_value = defaults::GRID_OUTPUT_CSV)]
        output: PathBuf,
    },

    /// Search a recommended operating point per category value
    Optimize {
        /// Trials per category value
        #[arg(long)]
        trials: Option<usize>,
        /// Base sampler seed
        #[arg(long)]
        seed: Option<u64>,
        /// CSV output path
        #[arg(long, default_value = defaults::STANDARDS_OUTPUT_CSV)]
        output: PathBuf,
        /// Also print the table as JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Startup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

fn load_artifact(config: &EngineConfig) -> Result<Arc<ModelArtifact>> {
    let path = &config.model.artifact_path;
    let artifact = ModelArtifact::load(path)
        .with_context(|| format!("Failed to load model artifact {}", path.display()))?;
    Ok(Arc::new(artifact))
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref path) = args.artifact {
        config.model.artifact_path.clone_from(path);
    }

    // CLI flags override config values
    match &args.command {
        SubCommand::Predict => {}
        SubCommand::Simulate {
            target,
            points,
            axes,
            ..
        } => {
            if let Some(t) = *target {
                config.grid.target = t;
            }
            if let Some(p) = *points {
                config.grid.points = p;
            }
            if !axes.is_empty() {
                config.grid.axes.clone_from(axes);
            }
        }
        SubCommand::Optimize { trials, seed, .. } => {
            if let Some(t) = *trials {
                config.search.trials_per_category = t;
            }
            if let Some(s) = *seed {
                config.search.seed = s;
                config.search.randomize_seed = false;
            }
        }
    }
    config.validate().context("Invalid options")?;

    let engine = Engine::new(load_artifact(&config)?, config);
    match &args.command {
        SubCommand::Predict => run_predict(&engine),
        SubCommand::Simulate { output, .. } => run_simulate(&engine, output),
        SubCommand::Optimize { output, json, .. } => run_optimize(&engine, output, *json),
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_simulate(engine: &Engine, output: &Path) -> Result<()> {
    let table = engine.simulate().context("Grid simulation failed")?;
    println!(
        "{}",
        report::render_grid_summary(&table, engine.config().grid.report_rows)
    );
    report::save_grid_csv(&table, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(rows = table.len(), path = %output.display(), "Simulation results saved");
    Ok(())
}

fn run_optimize(engine: &Engine, output: &Path, json: bool) -> Result<()> {
    // Fail before any trial when the artifact cannot bound the search
    engine
        .artifact()
        .domains()
        .context("Model artifact has no parameter domains; re-export it with param_ranges")?;

    let table = engine.optimize().context("Standards search failed")?;
    report::save_standards_csv(&table, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(rows = table.len(), path = %output.display(), "Standards table saved");
    if json {
        println!("{}", table.to_json().context("Failed to serialize standards table")?);
    }
    Ok(())
}

fn run_predict(engine: &Engine) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let top_k = engine.config().explain.top_k;

    writeln!(out, "Enter operating parameters ('exit' to quit).")?;
    loop {
        let Some(record) = prompt_record(
            engine.artifact().layout(),
            &engine.config().model.optional_parameters,
            &mut input,
            &mut out,
        )?
        else {
            return Ok(());
        };
        match engine.assess(&record) {
            Ok(assessment) => write!(
                out,
                "{}",
                report::render_assessment(&assessment, &record, top_k)
            )?,
            Err(e) => writeln!(out, "Prediction failed: {e}")?,
        }
    }
}

/// Read one record: numeric parameters first, then categorical ones.
///
/// Returns `None` on `exit` or end of input. Blank answers skip optional
/// parameters; invalid numbers re-prompt.
fn prompt_record<R: BufRead, W: Write>(
    layout: &FeatureLayout,
    optional: &[String],
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<ParamRecord>> {
    let mut record = ParamRecord::new();
    for slot in layout.slots() {
        let name = slot.name();
        let is_optional = optional.iter().any(|o| o == name);
        loop {
            match slot.kind() {
                ParamKind::Numeric => write!(out, "  {name} (e.g. 150.5): ")?,
                ParamKind::Categorical => write!(out, "  {name} (e.g. A1B2): ")?,
            }
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("exit") {
                return Ok(None);
            }
            if answer.is_empty() && is_optional {
                break;
            }
            match slot.kind() {
                ParamKind::Numeric => match answer.parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        record.insert(name, v);
                        break;
                    }
                    _ => writeln!(out, "  Please enter a number.")?,
                },
                ParamKind::Categorical => {
                    record.insert(name, answer);
                    break;
                }
            }
        }
    }
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use castline::ParamValue;

    fn make_layout() -> FeatureLayout {
        let cols: Vec<String> = ["Temp", "Pattern_A", "Pattern_B"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        FeatureLayout::build(&cols, &["Temp".to_string()], &["Pattern".to_string()], None)
            .unwrap()
    }

    #[test]
    fn test_prompt_reprompts_on_invalid_number() {
        let mut input = io::Cursor::new("abc\n150.5\nB\n");
        let mut out = Vec::new();
        let record = prompt_record(&make_layout(), &[], &mut input, &mut out)
            .unwrap()
            .unwrap();
        assert_eq!(record.get("Temp"), Some(&ParamValue::Numeric(150.5)));
        assert_eq!(record.get("Pattern"), Some(&ParamValue::Categorical("B".into())));
        assert!(String::from_utf8(out).unwrap().contains("Please enter a number."));
    }

    #[test]
    fn test_prompt_exit_ends_session() {
        let mut input = io::Cursor::new("150\nEXIT\n");
        let mut out = Vec::new();
        assert!(prompt_record(&make_layout(), &[], &mut input, &mut out)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_prompt_blank_skips_optional() {
        let mut input = io::Cursor::new("\n\n");
        let mut out = Vec::new();
        let optional = vec!["Temp".to_string(), "Pattern".to_string()];
        let record = prompt_record(&make_layout(), &optional, &mut input, &mut out)
            .unwrap()
            .unwrap();
        assert!(record.is_empty());
    }
}
