use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use portfolio_optimizer_core::consolidation::{self, ConsolidationInput};

use super::document;
use crate::config::Settings;

/// Arguments for family consolidation
#[derive(Args)]
pub struct ConsolidateArgs {
    /// Path to a JSON/YAML input (universe, entities, overrides)
    #[arg(long)]
    pub input: Option<String>,

    /// Override an entity's own value, as id=amount (repeatable)
    #[arg(long = "set-value")]
    pub set_value: Vec<String>,

    /// Print only this entity's consolidated position
    #[arg(long)]
    pub entity: Option<String>,
}

fn parse_assignment(raw: &str) -> Result<(&str, Decimal), Box<dyn std::error::Error>> {
    let (id, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected id=amount, got '{raw}'"))?;
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("Invalid amount in '{raw}': {e}"))?;
    Ok((id.trim(), amount))
}

pub fn run_consolidate(
    args: ConsolidateArgs,
    settings: &Settings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let doc = document(args.input.as_deref(), settings)?;
    if doc.get("entities").is_none() {
        return Err("Provide --input with an 'entities' list, or pipe JSON via stdin".into());
    }
    let mut input: ConsolidationInput = serde_json::from_value(doc)?;

    for raw in &args.set_value {
        let (id, amount) = parse_assignment(raw)?;
        let entity = input
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| format!("Unknown entity '{id}' in --set-value"))?;
        entity.own_value = amount;
    }

    let output = consolidation::consolidate_family(&input)?;

    match &args.entity {
        Some(id) => {
            let position = output
                .result
                .positions
                .iter()
                .find(|p| &p.entity_id == id)
                .ok_or_else(|| format!("Unknown entity '{id}'"))?;
            Ok(serde_json::to_value(position)?)
        }
        None => Ok(serde_json::to_value(output)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        let (id, amount) = parse_assignment("heir = 250.5").unwrap();
        assert_eq!(id, "heir");
        assert_eq!(amount, Decimal::new(2505, 1));
    }

    #[test]
    fn test_parse_assignment_rejects_garbage() {
        assert!(parse_assignment("heir").is_err());
        assert!(parse_assignment("heir=lots").is_err());
    }
}
