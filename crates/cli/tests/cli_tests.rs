use clap::Parser;
use rewind_cli::cli::{Cli, Commands};
use rewind_cli::client::{NodeClient, DEFAULT_NODE_URL};
use rewind_cli::commands::checkpoint::{self, Verb};
use rewind_cli::commands::{inspect, status};
use rewind_core::state::RecoveryRecord;
use rewind_persistence::{FlashImageProvider, RecordFile};
use rewind_core::region::RegionProvider;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_verbs_parse() {
    let cli = Cli::try_parse_from(["rewind", "save"]).unwrap();
    assert_eq!(cli.node, DEFAULT_NODE_URL);
    assert_eq!(cli.command.verb(), Some(Verb::Save));

    let cli = Cli::try_parse_from(["rewind", "timer", "5", "1"]).unwrap();
    assert_eq!(cli.command.verb(), Some(Verb::Timer { seconds: 5, periodic: true }));

    let cli = Cli::try_parse_from(["rewind", "--node", "http://10.0.0.2:3000", "timer", "2", "0"]).unwrap();
    assert_eq!(cli.node, "http://10.0.0.2:3000");
    assert_eq!(cli.command.verb(), Some(Verb::Timer { seconds: 2, periodic: false }));

    for (arg, verb) in [("restore", Verb::Restore), ("stop", Verb::Stop), ("done", Verb::Done), ("erase", Verb::Erase)] {
        assert_eq!(Cli::try_parse_from(["rewind", arg]).unwrap().command.verb(), Some(verb));
    }

    let cli = Cli::try_parse_from(["rewind", "status", "--json"]).unwrap();
    assert_eq!(cli.command, Commands::Status { json: true });
    assert_eq!(cli.command.verb(), None);
}

#[test]
fn test_bad_arguments_rejected() {
    assert!(Cli::try_parse_from(["rewind", "timer", "5", "2"]).is_err());
    assert!(Cli::try_parse_from(["rewind", "timer", "-1", "0"]).is_err());
    assert!(Cli::try_parse_from(["rewind", "timer", "5"]).is_err());
    assert!(Cli::try_parse_from(["rewind", "reboot"]).is_err());
    assert!(checkpoint::parse_periodic("yes").is_err());
}

#[test]
fn test_status_table_fills_missing_fields() {
    let table = status::render(&json!({
        "strategy": "kernel",
        "session_state": "TimerArmed",
        "drift_us": null,
        "in_reboot": false,
        "timer": { "duration_secs": 5, "periodic": true }
    }))
    .to_string();

    assert!(table.contains("kernel"));
    assert!(table.contains("TimerArmed"));
    assert!(table.contains("5s periodic"));
    assert!(table.contains('-'));
}

#[test]
fn test_unreachable_node_is_an_error() {
    let client = NodeClient::new("http://127.0.0.1:1/");
    assert_eq!(client.base_url(), "http://127.0.0.1:1");
    assert!(client.status().is_err());
    assert!(checkpoint::send(&client, Verb::Save).is_err());
}

#[test]
fn test_inspect_reads_node_files() {
    let dir = tempdir().unwrap();
    let record_path = dir.path().join("rewind.rec");
    let flash_path = dir.path().join("rewind-flash.img");

    RecordFile::open(&record_path)
        .unwrap()
        .store(&RecoveryRecord { in_reboot: true, rollback_timestamp: 42, ..RecoveryRecord::default() })
        .unwrap();
    {
        let mut flash = FlashImageProvider::open(&flash_path, &[("sram", 64), ("ccm", 32)]).unwrap();
        flash.live_mut(0)[..8].copy_from_slice(&17u64.to_le_bytes());
        flash.write_mirror(0).unwrap();
    }
    let image_len = std::fs::metadata(&flash_path).unwrap().len();

    assert!(inspect::run(Some(dir.path().to_path_buf()), None, None, 64, 32).is_ok());
    // A layout mismatch is reported, not fatal.
    assert!(inspect::run(Some(dir.path().to_path_buf()), None, None, 128, 32).is_ok());
    // Missing files are reported too.
    assert!(inspect::run(None, Some(dir.path().join("none.rec")), Some(dir.path().join("none.img")), 64, 32).is_ok());

    assert_eq!(std::fs::metadata(&flash_path).unwrap().len(), image_len);
    assert!(!dir.path().join("none.rec").exists());
    assert_eq!(inspect::saved_flight_cycle(&17u64.to_le_bytes()), Some(17));
    assert_eq!(inspect::saved_flight_cycle(&[0u8; 4]), None);
}
