pub mod file;
pub mod stdin;

use serde_json::Value;

/// Input document from `--input`, else piped stdin, else nothing.
pub fn load_value(path: Option<&str>) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(Some(file::read_value(p)?)),
        None => stdin::read_stdin(),
    }
}

/// Insert `key` into a JSON object when the document does not set it.
pub fn fill_missing(doc: &mut Value, key: &str, default: Value) {
    if let Value::Object(map) = doc {
        map.entry(key.to_string()).or_insert(default);
    }
}
