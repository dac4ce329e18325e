#![allow(dead_code)]

use engine_config::settings::{ManagerConfig, ManagerSettings};
use std::{fs, path::Path};

pub mod utils;

const GRAPH: &str = "basketballplayer";

/// Settings for a small, quiet manager: no stats loop, tiny pools.
fn test_settings(batch: usize) -> ManagerSettings {
    ManagerConfig::from_json(&format!(
        r#"{{
            "graph_name": "{GRAPH}",
            "batch": {batch},
            "reader_concurrency": 2,
            "importer_concurrency": 4,
            "stats_interval_ms": 0
        }}"#
    ))
    .and_then(ManagerConfig::validate)
    .expect("valid test settings")
}

/// Writes `rows` as comma separated lines and returns the byte size.
fn write_csv(path: &Path, rows: &[Vec<String>]) -> u64 {
    let body: String = rows.iter().map(|r| format!("{}\n", r.join(","))).collect();
    fs::write(path, &body).expect("write csv fixture");
    body.len() as u64
}

/// `n` player rows: `id,name,age`.
fn players(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| vec![format!("player{i:04}"), format!("Name {i}"), (20 + i % 20).to_string()])
        .collect()
}
