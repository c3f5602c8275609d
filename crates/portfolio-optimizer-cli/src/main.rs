mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::analytics::{AnalyzeArgs, RiskBudgetArgs};
use commands::consolidation::ConsolidateArgs;
use commands::defaults::DefaultsArgs;
use commands::optimization::{ErcArgs, FrontierArgs, ShortcutArgs};

/// Portfolio construction analytics
#[derive(Parser)]
#[command(
    name = "pfo",
    version,
    about = "Portfolio construction analytics",
    long_about = "A CLI for portfolio construction: risk/return statistics with leverage, \
                  Euler risk budgets, equal risk contribution, constrained efficient \
                  frontiers and family-office consolidation."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (.yaml, .yml or .json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Portfolio statistics, risk budget and per-asset VaR
    Analyze(AnalyzeArgs),
    /// Per-asset contribution to portfolio volatility
    RiskBudget(RiskBudgetArgs),
    /// Equal risk contribution allocation
    Erc(ErcArgs),
    /// Constraint-aware equal-weight or ERC allocation
    Shortcut(ShortcutArgs),
    /// Sampled efficient frontier under constraints
    Frontier(FrontierArgs),
    /// Consolidate a family of entities with inherited exposure
    Consolidate(ConsolidateArgs),
    /// Print the built-in asset universe and presets
    Defaults(DefaultsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match config::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::analytics::run_analyze(args, &settings),
        Commands::RiskBudget(args) => commands::analytics::run_risk_budget(args, &settings),
        Commands::Erc(args) => commands::optimization::run_erc(args, &settings),
        Commands::Shortcut(args) => commands::optimization::run_shortcut(args, &settings),
        Commands::Frontier(args) => commands::optimization::run_frontier(args, &settings),
        Commands::Consolidate(args) => commands::consolidation::run_consolidate(args, &settings),
        Commands::Defaults(args) => commands::defaults::run_defaults(args, &settings),
        Commands::Version => {
            println!("pfo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
