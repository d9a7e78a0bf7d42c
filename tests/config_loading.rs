// tests/config_loading.rs
//! Layered configuration: defaults, files, then environment

use hallkey_core::config::{ConfigError, ConfigLoader, OverflowPolicy, SystemConfig};
use serial_test::serial;
use std::io::Write;

fn clear_env() {
    for key in [
        "HALLKEY_HOST__QUEUE_CAPACITY",
        "HALLKEY_HOST__OVERFLOW_POLICY",
        "HALLKEY_HOST__DISPATCH_PERIOD_MS",
        "HALLKEY_SERIAL__BAUD_RATE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_env_overrides_queue_settings() {
    clear_env();
    std::env::set_var("HALLKEY_HOST__QUEUE_CAPACITY", "64");
    std::env::set_var("HALLKEY_HOST__OVERFLOW_POLICY", "drop_oldest");

    let result = ConfigLoader::with_paths(vec![]).load_system_config();
    clear_env();

    let config = result.unwrap();
    assert_eq!(config.host.queue_capacity, 64);
    assert_eq!(config.host.overflow_policy, OverflowPolicy::DropOldest);
    assert_eq!(config.device, SystemConfig::default().device);
}

#[test]
#[serial]
fn test_env_wins_over_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[serial]\nbaud_rate = 9600\nport_name = \"/dev/ttyACM1\"").unwrap();
    std::env::set_var("HALLKEY_SERIAL__BAUD_RATE", "230400");

    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load_system_config();
    clear_env();

    let config = result.unwrap();
    assert_eq!(config.serial.baud_rate, 230_400);
    assert_eq!(config.serial.port_name, "/dev/ttyACM1");
}

#[test]
#[serial]
fn test_later_files_win() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.toml");
    let local = dir.path().join("local.toml");
    std::fs::write(&base, "[host]\ndispatch_period_ms = 40\nqueue_capacity = 128\n").unwrap();
    std::fs::write(&local, "[host]\ndispatch_period_ms = 10\n").unwrap();

    let config = ConfigLoader::with_paths(vec![base, local]).load_system_config().unwrap();
    assert_eq!(config.host.dispatch_period_ms, 10);
    assert_eq!(config.host.queue_capacity, 128);
}

#[test]
#[serial]
fn test_zero_dispatch_period_is_rejected() {
    clear_env();
    std::env::set_var("HALLKEY_HOST__DISPATCH_PERIOD_MS", "0");

    let result = ConfigLoader::with_paths(vec![]).load_system_config();
    clear_env();

    match result {
        Err(ConfigError::ValidationError(problems)) => {
            assert!(problems.iter().any(|p| p.contains("dispatch period")), "{problems:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_malformed_file_is_a_parse_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[host\nqueue_capacity = ").unwrap();

    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load_system_config();
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}
