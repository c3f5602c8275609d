pub mod analytics;
pub mod consolidation;
pub mod defaults;
pub mod optimization;

use serde_json::{json, Value};

use crate::config::Settings;
use crate::input;

/// Input document with the configured universe filled in when absent.
///
/// Without `--input` or piped stdin the document starts empty, so flag-only
/// invocations run against the configured universe.
pub(crate) fn document(
    path: Option<&str>,
    settings: &Settings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut doc = input::load_value(path)?.unwrap_or_else(|| json!({}));
    if !doc.is_object() {
        return Err("input must be a JSON or YAML object".into());
    }
    input::fill_missing(&mut doc, "universe", serde_json::to_value(&settings.payload.universe)?);
    Ok(doc)
}
