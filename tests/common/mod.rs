#![allow(dead_code)]

use meshplot::FlatRecord;
use std::path::Path;

pub fn record(fields: &[(&str, f64)]) -> FlatRecord {
    fields.iter().map(|&(k, v)| (k, v)).collect()
}

/// Write `records` as a JSON array to `<dir>/<source_id>.json`.
pub fn write_source(dir: &Path, source_id: &str, records: &[serde_json::Value]) {
    let body = serde_json::to_string(records).expect("serialize records");
    std::fs::write(dir.join(format!("{source_id}.json")), body).expect("write source");
}

/// Two runs per key value for `key` with delivery rate `r`.
pub fn delivery_records(key: &str, values: &[f64]) -> Vec<serde_json::Value> {
    values
        .iter()
        .flat_map(|&v| {
            [
                serde_json::json!({ key: v, "r": 0.5 }),
                serde_json::json!({ key: v, "r": 0.7 }),
            ]
        })
        .collect()
}

/// Memory records for time steps 0..steps, two runs each, growing usage.
pub fn memory_records(steps: usize, scale: f64) -> Vec<serde_json::Value> {
    (0..steps)
        .flat_map(|t| {
            let base = scale * (t as f64 + 1.0);
            [
                serde_json::json!({ "t": t, "s": base }),
                serde_json::json!({ "t": t, "s": base * 1.5 }),
            ]
        })
        .collect()
}
