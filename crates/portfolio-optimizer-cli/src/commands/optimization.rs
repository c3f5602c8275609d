use clap::{Args, ValueEnum};
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

use portfolio_optimizer_core::optimization::{
    self, CancellationToken, ErcInput, FrontierInput, ShortcutInput, ShortcutMethod,
};

use super::document;
use crate::config::Settings;
use crate::input;

/// Arguments for the equal risk contribution allocation
#[derive(Args)]
pub struct ErcArgs {
    /// Path to a JSON/YAML input (universe, exclude_ids, solver)
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated asset ids to leave out (overrides config)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Solver rounds
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Early-exit tolerance on the relative contribution gap
    #[arg(long)]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    EqualWeight,
    Erc,
}

impl From<MethodArg> for ShortcutMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::EqualWeight => ShortcutMethod::EqualWeight,
            MethodArg::Erc => ShortcutMethod::Erc,
        }
    }
}

/// Arguments for constraint-aware shortcut allocations
#[derive(Args)]
pub struct ShortcutArgs {
    /// Path to a JSON/YAML input (universe, constraints, method)
    #[arg(long)]
    pub input: Option<String>,

    /// Allocation method (overrides the input document)
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,
}

/// Arguments for the sampled efficient frontier
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to a JSON/YAML input (universe, constraints, sampling options)
    #[arg(long)]
    pub input: Option<String>,

    /// Random candidates to draw
    #[arg(long)]
    pub samples: Option<u32>,

    /// Seed for a reproducible search
    #[arg(long)]
    pub seed: Option<u64>,

    /// Volatility bin width for the display curve
    #[arg(long)]
    pub bin_width: Option<f64>,

    /// Include every accepted candidate in the output
    #[arg(long)]
    pub include_population: bool,

    /// Stop sampling after this many seconds and keep what was found
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

fn solver_defaults(settings: &Settings) -> Value {
    let mut solver = json!({ "max_iterations": settings.engine.erc_max_iterations });
    if let Some(tol) = settings.engine.erc_tolerance {
        solver["tolerance"] = json!(tol);
    }
    solver
}

pub fn run_erc(args: ErcArgs, settings: &Settings) -> Result<Value, Box<dyn std::error::Error>> {
    let mut doc = document(args.input.as_deref(), settings)?;
    input::fill_missing(&mut doc, "exclude_ids", json!(settings.engine.erc_exclude_ids));
    input::fill_missing(&mut doc, "solver", solver_defaults(settings));
    let mut input: ErcInput = serde_json::from_value(doc)?;

    if let Some(ids) = args.exclude {
        input.exclude_ids = ids;
    }
    if let Some(n) = args.max_iterations {
        input.solver.max_iterations = n;
    }
    if args.tolerance.is_some() {
        input.solver.tolerance = args.tolerance;
    }

    let result = optimization::solve_erc(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_shortcut(
    args: ShortcutArgs,
    settings: &Settings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut doc = document(args.input.as_deref(), settings)?;
    input::fill_missing(&mut doc, "method", json!("equal_weight"));
    input::fill_missing(&mut doc, "solver", solver_defaults(settings));
    let mut input: ShortcutInput = serde_json::from_value(doc)?;

    if let Some(method) = args.method {
        input.method = method.into();
    }

    let result = optimization::apply_shortcut(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(
    args: FrontierArgs,
    settings: &Settings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = &settings.engine;
    let mut doc = document(args.input.as_deref(), settings)?;
    input::fill_missing(&mut doc, "sample_count", json!(engine.frontier_samples));
    input::fill_missing(&mut doc, "bin_width", json!(engine.frontier_bin_width));
    input::fill_missing(&mut doc, "blend_steps", json!(engine.blend_steps));
    input::fill_missing(&mut doc, "risk_free_rate", json!(engine.risk_free_rate));
    if let Some(seed) = engine.frontier_seed {
        input::fill_missing(&mut doc, "seed", json!(seed));
    }
    let mut input: FrontierInput = serde_json::from_value(doc)?;

    if let Some(n) = args.samples {
        input.sample_count = n;
    }
    if args.seed.is_some() {
        input.seed = args.seed;
    }
    if let Some(w) = args.bin_width {
        input.bin_width = w;
    }
    if args.include_population {
        input.include_population = true;
    }

    let token = args.timeout_secs.map(|secs| {
        let token = CancellationToken::new();
        let remote = token.clone();
        // detached: the process exits as soon as the search returns
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            remote.cancel();
        });
        token
    });

    let result = optimization::search_frontier_with_cancel(&input, token)?;
    Ok(serde_json::to_value(result)?)
}
