//! Unit tests for bootstrap configuration
//!
//! Covers TOML loading with defaults and root folder resolution priority.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FLYER_CACHE_ROOT are marked with #[serial].

use flyer_common::config::{
    load_toml_config, resolve_root_folder, RootLayout, TomlConfig, ROOT_FOLDER_ENV,
};
use flyer_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
root_folder = "/srv/flyers"

[logging]
level = "debug"

[acquisition]
zoom_level = 3
max_concurrent_acquisitions = 2
"#,
    );

    let config = load_toml_config(Some(&path)).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/flyers")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.acquisition.zoom_level, 3);
    assert_eq!(config.acquisition.max_concurrent_acquisitions, 2);
    assert_eq!(config.acquisition.freshness_window_days, 7);
    assert_eq!(config.acquisition.default_category, "Groceries");
}

#[test]
fn test_empty_toml_is_all_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let config = load_toml_config(Some(&path)).unwrap();

    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.acquisition.tile_retry_attempts, 2);
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = TempDir::new().unwrap();
    let result = load_toml_config(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[acquisition\nzoom_level = ");
    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[acquisition]\nacquisition_timeout_secs = 0\n");
    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_oversized_freshness_window_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[acquisition]\nfreshness_window_days = 100000000000\n");
    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_used_without_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_compiled_default_is_fallback() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, &TomlConfig::default());

    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.to_string_lossy().contains("flyer"));
}

#[test]
fn test_root_layout_creates_image_directory() {
    let dir = TempDir::new().unwrap();
    let layout = RootLayout::new(dir.path().join("root"));

    layout.ensure_directories().unwrap();

    assert!(layout.images_dir.is_dir());
    assert_eq!(layout.database_path, dir.path().join("root").join("flyer-cache.db"));
}

#[test]
fn test_canonical_layout_ignores_root_spelling() {
    let dir = TempDir::new().unwrap();
    let plain = RootLayout::new(dir.path().join("root"));
    plain.ensure_directories().unwrap();
    let dotted = RootLayout::new(dir.path().join(".").join("root").join("..").join("root"));

    let plain = plain.canonicalize().unwrap();
    let dotted = dotted.canonicalize().unwrap();

    assert_eq!(plain, dotted);
    assert!(plain.root.is_absolute());
    assert!(plain.images_dir.is_dir());
}

#[test]
fn test_canonicalize_requires_existing_root() {
    let dir = TempDir::new().unwrap();
    let layout = RootLayout::new(dir.path().join("missing"));
    assert!(matches!(layout.canonicalize(), Err(Error::Io(_))));
}
