//! Runs the shower binary end to end.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::Path;
use std::process::Command;

use dps_records::{EventReader, open_reader};
use dps_types::{Event, Schema};

const LHE: &str = "\
<LesHouchesEvents version=\"3.0\">
<init>
2212 2212 6.8e3 6.8e3 0 0 0 0 3 1
</init>
<event>
 4 1 1.0 91.2 7.8e-3 0.118
 21 -1 0 0 501 502 0 0 300 300 0 0 9
 21 -1 0 0 502 503 0 0 -200 200 0 0 9
 21 1 1 2 501 504 20 10 50 55.9 0 0 9
 21 1 1 2 504 503 -20 -10 50 55.9 0 0 9
</event>
<event>
 4 1 1.0 91.2 7.8e-3 0.118
 21 -1 0 0 501 502 0 0 300 300 0 0 9
 21 -1 0 0 502 503 0 0 -200 200 0 0 9
 21 1 1 2 501 504 5 30 -40 50.2 0 0 9
 21 1 1 2 504 503 -5 -30 40 50.2 0 0 9
</event>
<event>
 4 1 1.0 91.2 7.8e-3 0.118
 21 -1 0 0 501 502 0 0 300 300 0 0 9
 21 -1 0 0 502 503 0 0 -200 200 0 0 9
 21 1 1 2 501 504 1 2 3 3.8 0 0 9
 21 1 1 2 504 503 -1 -2 -3 3.8 0 0 9
</event>
</LesHouchesEvents>
";

fn shower(dir: &Path, config: &str, extra: &[&str]) -> (bool, Vec<Event>, serde_json::Value) {
    let input = dir.join("in.lhe");
    let output = dir.join("out.hepmc3");
    let config_path = dir.join("dps-config.yaml");
    let summary = dir.join("summary.json");
    std::fs::write(&input, LHE).unwrap();
    std::fs::write(&config_path, config).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_dps-shower"))
        .arg(&input)
        .arg(&output)
        .arg("--config")
        .arg(&config_path)
        .arg("--summary")
        .arg(&summary)
        .args(extra)
        .env_remove("DPS_SEED")
        .env_remove("DPS_MAX_ATTEMPTS")
        .status()
        .unwrap();

    let mut events = Vec::new();
    if output.exists() {
        let mut reader = open_reader(&output, Schema::Rich).unwrap();
        while let Some(event) = reader.read_next().unwrap() {
            events.push(event);
        }
    }
    let summary = serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    (status.success(), events, summary)
}

#[test]
fn normal_mode_writes_every_state() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, events, summary) = shower(dir.path(), "hadronizer:\n  failure_rate: 0.0\n", &["--mode", "normal"]);
    assert!(ok);
    assert_eq!(events.len(), 3);
    let numbers: Vec<u64> = events.iter().map(|e| e.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(events.iter().all(|e| e.particle_count() > 4));
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["stats"]["stats"]["accepted"], 3);
}

#[test]
fn enriched_mode_drops_states_without_a_match() {
    let dir = tempfile::tempdir().unwrap();
    let config = "hadronizer:\n  failure_rate: 0.0\nselection:\n  pdg_abs: 999999\n";
    let (ok, events, summary) = shower(dir.path(), config, &["--max-attempts", "3", "--events", "2"]);
    assert!(ok);
    assert!(events.is_empty());
    assert_eq!(summary["stats"]["end_reason"], "event_limit");
    assert_eq!(summary["stats"]["stats"]["exhausted"], 2);
    assert_eq!(summary["stats"]["stats"]["total_attempts"], 6);
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_dps-shower"))
        .arg(dir.path().join("absent.lhe"))
        .arg(dir.path().join("out.hepmc3"))
        .status()
        .unwrap();
    assert!(!status.success());
}
