//! Loading configuration from disk.

#![allow(clippy::unwrap_used)]

use dps_core::{ConfigError, DpsConfig};

#[test]
fn shipped_config_matches_defaults() {
    let mut config: DpsConfig = serde_yml::from_str(include_str!("../../../dps-config.yaml")).unwrap();
    config.apply_overrides(|_| None).unwrap();
    assert_eq!(config, DpsConfig::default());
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dps-config.yaml");
    std::fs::write(&path, "mixing:\n  policy: lockstep\n").unwrap();
    let config = DpsConfig::from_file(&path).unwrap();
    assert_eq!(config.mixing.policy, dps_assembly::PairingPolicy::Lockstep);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DpsConfig::from_file(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
