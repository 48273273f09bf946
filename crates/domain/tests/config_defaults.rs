use std::path::PathBuf;

use bx_domain::config::{Config, ConfigSeverity, FetchMode};

#[test]
fn default_mode_is_offline() {
    let config = Config::default();
    assert_eq!(config.exchange.mode, FetchMode::Offline);
}

#[test]
fn empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.store.path, PathBuf::from("./data/blocks"));
    assert_eq!(config.logging.filter, "info,bx_exchange=debug");
    assert!(!config.logging.json);
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[exchange]
mode = "pending"
fetch_timeout_ms = 2500
announce_capacity = 64

[store]
path = "/var/lib/bx/blocks"

[logging]
filter = "debug"
json = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.exchange.mode, FetchMode::Pending);
    assert_eq!(config.exchange.fetch_timeout_ms, 2500);
    assert_eq!(config.exchange.announce_capacity, 64);
    assert_eq!(config.store.path, PathBuf::from("/var/lib/bx/blocks"));
    assert!(config.logging.json);
    assert!(config.validate().is_empty());
}

#[test]
fn unknown_mode_is_rejected() {
    let toml_str = r#"
[exchange]
mode = "bitswap"
"#;
    assert!(toml::from_str::<Config>(toml_str).is_err());
}

#[test]
fn empty_store_path_fails_validation() {
    let toml_str = r#"
[store]
path = ""
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.field == "store.path" && i.severity == ConfigSeverity::Error));
}
