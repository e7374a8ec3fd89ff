//! Configuration and root folder resolution tests
//!
//! Uses serial_test so tests touching REIMS_ROOT_FOLDER do not race.

use reims_common::config::{
    default_root_folder, ConfigSource, RootFolder, RootFolderResolver, TomlConfig,
    UnitCountPolicy, ROOT_FOLDER_ENV,
};
use reims_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig::default();

    let root = RootFolderResolver::new(None, &toml).resolve();

    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/reims-env-root");
    let toml = TomlConfig::default();

    let root = RootFolderResolver::new(None, &toml).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/reims-env-root"));
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/reims-env-root");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/reims-toml-root")),
        ..TomlConfig::default()
    };

    let root = RootFolderResolver::new(Some(PathBuf::from("/tmp/reims-cli-root")), &toml).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/reims-cli-root"));
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/reims-env-root");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/reims-toml-root")),
        ..TomlConfig::default()
    };

    let root = RootFolderResolver::new(None, &toml).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/reims-env-root"));
}

#[test]
#[serial]
fn test_resolver_toml_used_when_no_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/reims-toml-root")),
        ..TomlConfig::default()
    };

    let root = RootFolderResolver::new(None, &toml).resolve();

    assert_eq!(root, PathBuf::from("/tmp/reims-toml-root"));
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let (config, source) = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert_eq!(config.bind_addr, TomlConfig::default().bind_addr);
    assert!(matches!(source, ConfigSource::Fallback { .. }));
}

#[test]
fn test_malformed_config_file_reports_fallback() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reims.toml");
    std::fs::write(&path, "[rent_roll]\nunit_count_policy = \"warn\"\nbind_addr = [\n").unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));

    assert_eq!(config.rent_roll.unit_count_policy, UnitCountPolicy::Reject);
    match source {
        ConfigSource::Fallback { path: reported, error } => {
            assert_eq!(reported, path);
            assert!(matches!(error, Error::Config(_)));
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[test]
fn test_config_file_loaded_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reims.toml");
    std::fs::write(&path, "bind_addr = \"0.0.0.0:8080\"\n[storage]\nbucket = \"archive\"\n").unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));

    assert!(matches!(source, ConfigSource::File(ref p) if p == &path));
    assert_eq!(config.bind_addr, "0.0.0.0:8080");
    assert_eq!(config.storage.bucket, "archive");
}

#[test]
fn test_root_folder_initializer_creates_directory() {
    let dir = TempDir::new().unwrap();
    let root_path = dir.path().join("a").join("b");
    let root = RootFolder::new(root_path.clone(), &TomlConfig::default());

    root.ensure_directory_exists().unwrap();

    assert!(root_path.is_dir());
    assert_eq!(root.database_path(), root_path.join("reims.db"));
}

#[test]
fn test_explicit_database_path_overrides_root() {
    let toml = TomlConfig {
        database_path: Some(PathBuf::from("/var/db/other.db")),
        ..TomlConfig::default()
    };
    let root = RootFolder::new(PathBuf::from("/srv/reims"), &toml);
    assert_eq!(root.database_path(), PathBuf::from("/var/db/other.db"));
    assert_eq!(root.storage_path(), PathBuf::from("/srv/reims/storage"));
}
