use serde_json::Value;

use super::{format_cell, result_of};

/// Headline figure per command, checked in order.
const PRIORITY_KEYS: [&str; 8] = [
    "sharpe_ratio",
    "display_weights",
    "weights",
    "max_sharpe",
    "family",
    "positions",
    "volatility",
    "presets",
];

/// Print just the headline answer from the output.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                println!("{}", headline(val));
                return;
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{key}: {}", headline(val));
            return;
        }
    }

    println!("{}", headline(result));
}

/// Objects collapse to their `weights` (frontier points, family aggregate);
/// everything else prints as a single cell.
fn headline(value: &Value) -> String {
    match value.get("weights") {
        Some(w) => format_cell(w),
        None => format_cell(value),
    }
}
