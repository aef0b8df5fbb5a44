use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;

use crate::client::NodeClient;

const FIELDS: &[(&str, &str)] = &[
    ("strategy", "Strategy"),
    ("session_state", "Session"),
    ("checkpoint_timestamp", "Checkpoint ts (us)"),
    ("rollback_timestamp", "Rollback ts (us)"),
    ("drift_us", "Drift (us)"),
    ("in_reboot", "In reboot"),
    ("snapshot_taken", "Snapshot taken"),
    ("mirrors_erased", "Mirrors erased"),
    ("companion_synced", "Companion synced"),
    ("rollback_period_us", "Rollback period (us)"),
    ("armed", "Armed"),
    ("flight_cycle", "Flight cycle"),
    ("disarms_published", "Disarms sent"),
];

pub fn run(client: &NodeClient, json: bool) -> anyhow::Result<()> {
    let status = client.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("{}", render(&status));
    Ok(())
}

/// Key fields as a table; absent or null fields show as `-`.
pub fn render(status: &Value) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);

    for (key, label) in FIELDS {
        let value = match &status[*key] {
            Value::Null => "-".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        table.add_row(vec![label.to_string(), value]);
    }
    if let Some(timer) = status["timer"].as_object() {
        let secs = timer.get("duration_secs").cloned().unwrap_or(Value::Null);
        let periodic = timer.get("periodic").and_then(Value::as_bool).unwrap_or(false);
        let kind = if periodic { "periodic" } else { "one-shot" };
        table.add_row(vec!["Timer".to_string(), format!("{}s {}", secs, kind)]);
    }
    table
}
