use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use std::path::PathBuf;
use rewind_persistence::{read_mirrors, RecordFile};

/// Offline look at a node's files. Nothing is created or modified.
pub fn run(
    dir: Option<PathBuf>,
    record_path_arg: Option<PathBuf>,
    flash_path_arg: Option<PathBuf>,
    sram: usize,
    ccm: usize,
) -> anyhow::Result<()> {
    let (r_path, f_path) = match dir {
        Some(d) => (d.join("rewind.rec"), d.join("rewind-flash.img")),
        None => (
            record_path_arg.unwrap_or_else(|| PathBuf::from("rewind.rec")),
            flash_path_arg.unwrap_or_else(|| PathBuf::from("rewind-flash.img")),
        ),
    };

    println!("\nRewind Recovery Report");
    println!("----------------------");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["File", "Status", "Details"]);

    // 1. Recovery record
    if r_path.exists() {
        match RecordFile::read(&r_path) {
            Ok(Some(rec)) => {
                let msg = format!(
                    "checkpoint_ts: {}, rollback_ts: {}, last_action_us: {}, in_reboot: {}, snapshot_taken: {}",
                    rec.checkpoint_timestamp, rec.rollback_timestamp, rec.last_action_us, rec.in_reboot, rec.snapshot_taken
                );
                table.add_row(vec!["Record", "FOUND", &msg]);
            }
            Ok(None) => {
                table.add_row(vec!["Record", "EMPTY", ""]);
            }
            Err(e) => {
                table.add_row(vec!["Record", "CORRUPT", &e.to_string()]);
            }
        }
    } else {
        table.add_row(vec!["Record", "MISSING", ""]);
    }

    // 2. Flash image
    if f_path.exists() {
        match read_mirrors(&f_path, &[("sram", sram), ("ccm", ccm)]) {
            Ok(mirrors) => {
                for (idx, mirror) in mirrors.iter().enumerate() {
                    let label = format!("Mirror {}", mirror.name);
                    let size = mirror.bytes.len();
                    if mirror.is_erased() {
                        table.add_row(vec![label.as_str(), "ERASED", &format!("{} bytes", size)]);
                    } else {
                        let details = match saved_flight_cycle(&mirror.bytes) {
                            Some(cycle) if idx == 0 => format!("{} bytes, flight cycle {}", size, cycle),
                            _ => format!("{} bytes", size),
                        };
                        table.add_row(vec![label.as_str(), "USED", &details]);
                    }
                }
            }
            Err(e) => {
                table.add_row(vec!["Flash", "ERROR", &e.to_string()]);
            }
        }
    } else {
        table.add_row(vec!["Flash", "MISSING", ""]);
    }

    println!("{table}\n");

    Ok(())
}

/// The node keeps its cycle counter in the first eight bytes of sram.
pub fn saved_flight_cycle(mirror: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = mirror.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
