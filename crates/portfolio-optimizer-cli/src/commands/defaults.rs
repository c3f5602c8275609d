use clap::Args;
use serde_json::{json, Value};

use crate::config::Settings;

/// Arguments for printing the default payload
#[derive(Args)]
pub struct DefaultsArgs {
    /// Print a single preset instead of the whole payload
    #[arg(long)]
    pub preset: Option<String>,

    /// Print the effective engine configuration
    #[arg(long)]
    pub show_config: bool,
}

pub fn run_defaults(args: DefaultsArgs, settings: &Settings) -> Result<Value, Box<dyn std::error::Error>> {
    if args.show_config {
        return Ok(serde_json::to_value(&settings.engine)?);
    }
    match &args.preset {
        Some(key) => {
            let preset = settings
                .payload
                .preset(key)
                .ok_or_else(|| format!("Unknown preset '{key}'"))?;
            let stats = portfolio_optimizer_core::analytics::portfolio_stats(
                &preset.weights.normalized(),
                &settings.payload.universe,
            )?;
            Ok(json!({ "preset": preset, "stats": stats }))
        }
        None => Ok(serde_json::to_value(&settings.payload)?),
    }
}
