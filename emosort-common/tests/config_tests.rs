//! Configuration file resolution and persistence
//!
//! Tests that manipulate EMOSORT_CONFIG are marked with #[serial] so they
//! never race each other.

use emosort_common::config::{DiscardPolicy, PipelineConfig, CONFIG_ENV_VAR};
use emosort_common::Error;
use serial_test::serial;
use std::env;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let temp_dir = TempDir::new().unwrap();
    let cli_path = temp_dir.path().join("cli.toml");
    let env_path = temp_dir.path().join("env.toml");

    std::fs::write(&cli_path, "[recognize]\nbatch_size = 3\n").unwrap();
    std::fs::write(&env_path, "[recognize]\nbatch_size = 7\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = PipelineConfig::resolve(Some(&cli_path)).unwrap();
    assert_eq!(config.recognize.batch_size, 3);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    std::fs::write(&env_path, "[classify]\nnum_workers = 9\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = PipelineConfig::resolve(None).unwrap();
    assert_eq!(config.classify.num_workers, 9);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let result = PipelineConfig::resolve(Some(&missing));
    assert!(matches!(result, Err(Error::ConfigRead { .. })));
}

#[test]
fn test_load_reads_every_section() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[filter]
max_duration = 12.5
discard_policy = "delete_source"

[services]
max_requests_per_second = 20

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let loaded = PipelineConfig::load(&path).unwrap();
    assert_eq!(loaded.filter.discard_policy, DiscardPolicy::DeleteSource);
    assert_eq!(loaded.filter.max_duration, 12.5);
    assert_eq!(loaded.filter.min_duration, 3.0);
    assert_eq!(loaded.services.max_requests_per_second, Some(20));
    assert_eq!(loaded.logging.level, "debug");
}
