//! Configuration loading and root folder resolution tests
//!
//! Tests that manipulate COACHLINK_ROOT are marked with #[serial] so they do
//! not race each other on the process environment.

use coachlink_common::config::{
    ensure_root_folder, load_toml_config, resolve_root_folder, TomlConfig, DATABASE_FILE_NAME,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_config_file_sections_are_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("coachlink-addr.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/coachlink"

[oracle]
model = "qwen-plus"
api_key = "sk-test"

[address]
sensitive_terms = ["收货人"]
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/coachlink")));
    assert_eq!(config.oracle.model, "qwen-plus");
    assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.oracle.timeout_secs, 60);
    assert_eq!(config.address.sensitive_terms, vec!["收货人".to_string()]);
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[pipeline\nbatch_size = ").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/coachlink-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/coachlink-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/coachlink-cli")), ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/coachlink-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/coachlink-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/coachlink-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/coachlink-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_overrides() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/coachlink-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/coachlink-toml"));
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let db_path = ensure_root_folder(&root).unwrap();

    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE_NAME));
}
