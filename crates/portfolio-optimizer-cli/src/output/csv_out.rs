use serde_json::{Map, Value};
use std::io;

use super::{flatten_scalars, format_cell, result_of};

/// Record arrays worth exporting, most useful first.
const PRIMARY_RECORDS: [&str; 5] = [
    "risk_budget",
    "curve",
    "pareto_frontier",
    "positions",
    "presets",
];

/// Write output as CSV to stdout.
///
/// Results carrying a known record array (risk budget, frontier curve,
/// consolidated positions) export that array; anything else is written as
/// flattened field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(result) => match primary_records(result) {
            Some(records) => write_records(&mut wtr, records),
            None => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in flatten_scalars(result) {
                    let _ = wtr.write_record([key, format_cell(&val)]);
                }
            }
        },
        Value::Array(arr) => write_records(&mut wtr, arr),
        other => {
            let _ = wtr.write_record([format_cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn primary_records(result: &Map<String, Value>) -> Option<&[Value]> {
    PRIMARY_RECORDS.iter().find_map(|key| match result.get(*key) {
        Some(Value::Array(arr)) if arr.first().is_some_and(Value::is_object) => {
            Some(arr.as_slice())
        }
        _ => None,
    })
}

fn write_records(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([format_cell(item)]);
        }
        return;
    };

    let headers: Vec<String> = flatten_scalars(first).into_iter().map(|(k, _)| k).collect();
    let _ = wtr.write_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let flat = flatten_scalars(map);
            let row: Vec<String> = headers
                .iter()
                .map(|h| {
                    flat.iter()
                        .find(|(k, _)| k == h)
                        .map(|(_, v)| format_cell(v))
                        .unwrap_or_default()
                })
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}
