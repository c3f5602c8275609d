use clap::Args;
use serde_json::{json, Value};

use portfolio_optimizer_core::analytics::{self, PortfolioAnalysisInput};
use portfolio_optimizer_core::universe::{LeverageProfile, WeightVector};

use crate::config::Settings;
use crate::input;

/// Portfolio selection shared by `analyze` and `risk-budget`
#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to a JSON/YAML analysis input (universe, weights, leverage)
    #[arg(long)]
    pub input: Option<String>,

    /// Named preset from the default payload (e.g. "balanced")
    #[arg(long)]
    pub preset: Option<String>,

    /// Comma-separated percent weights in universe order
    #[arg(long, value_delimiter = ',')]
    pub weights: Option<Vec<f64>>,

    /// Asset id to lever
    #[arg(long)]
    pub lever: Option<String>,

    /// Leverage ratio applied to --lever (>= 1)
    #[arg(long, default_value = "1.0")]
    pub ratio: f64,

    /// Financing cost on borrowed exposure, percent per year
    #[arg(long, default_value = "5.0")]
    pub borrow_cost: f64,
}

/// Arguments for full portfolio analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub portfolio: PortfolioArgs,

    /// Risk-free rate in percent (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,
}

/// Arguments for the Euler risk budget
#[derive(Args)]
pub struct RiskBudgetArgs {
    #[command(flatten)]
    pub portfolio: PortfolioArgs,
}

fn build_input(
    args: &PortfolioArgs,
    settings: &Settings,
) -> Result<PortfolioAnalysisInput, Box<dyn std::error::Error>> {
    let mut doc = match input::load_value(args.input.as_deref())? {
        Some(doc) => doc,
        None => json!({ "weights": flag_weights(args, settings)? }),
    };
    input::fill_missing(&mut doc, "universe", serde_json::to_value(&settings.payload.universe)?);
    input::fill_missing(&mut doc, "risk_free_rate", json!(settings.engine.risk_free_rate));
    input::fill_missing(
        &mut doc,
        "concentration_warning_pct",
        json!(settings.engine.concentration_warning_pct),
    );
    let mut parsed: PortfolioAnalysisInput = serde_json::from_value(doc)?;

    if let Some(id) = &args.lever {
        let idx = parsed
            .universe
            .index_of(id)
            .ok_or_else(|| format!("Unknown asset '{id}' for --lever"))?;
        let mut profile = parsed
            .leverage
            .take()
            .unwrap_or_else(|| LeverageProfile::unlevered(args.borrow_cost));
        profile.ratios.insert(idx, args.ratio);
        profile.borrow_cost = args.borrow_cost;
        parsed.leverage = Some(profile);
    }
    Ok(parsed)
}

fn flag_weights(
    args: &PortfolioArgs,
    settings: &Settings,
) -> Result<WeightVector, Box<dyn std::error::Error>> {
    if let Some(w) = &args.weights {
        return Ok(WeightVector::new(w.clone()));
    }
    if let Some(key) = &args.preset {
        let preset = settings.payload.preset(key).ok_or_else(|| {
            let known: Vec<&str> = settings.payload.presets.iter().map(|p| p.key.as_str()).collect();
            format!("Unknown preset '{key}'. Available: {}", known.join(", "))
        })?;
        return Ok(preset.weights.clone());
    }
    Err("Provide --input, --weights or --preset, or pipe JSON via stdin".into())
}

pub fn run_analyze(args: AnalyzeArgs, settings: &Settings) -> Result<Value, Box<dyn std::error::Error>> {
    let mut input = build_input(&args.portfolio, settings)?;
    if let Some(rf) = args.risk_free_rate {
        input.risk_free_rate = rf;
    }
    let result = analytics::analyze_portfolio(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_risk_budget(
    args: RiskBudgetArgs,
    settings: &Settings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let input = build_input(&args.portfolio, settings)?;
    input.universe.check_len("weights", input.weights.len())?;
    let weights = input.weights.normalized();
    let budget = analytics::risk_budget(&weights, &input.universe, input.leverage.as_ref())?;
    Ok(serde_json::to_value(budget)?)
}
