//! File-based configuration loading.

use std::io::Write;

use todos_config::{ConfigError, ConfigLoader, LogFormat};

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_toml_file() {
    let file = write_config(
        ".toml",
        r#"
            [server]
            http_addr = "127.0.0.1:8081"
            keep_alive = false

            [logging]
            format = "pretty"
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.http_addr, "127.0.0.1:8081");
    assert!(!config.server.keep_alive);
    assert_eq!(config.server.shutdown_timeout_secs, 30);
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.store.path, "db.sqlite");
}

#[test]
fn test_json_file() {
    let file = write_config(".json", r#"{"store": {"path": "todos.db"}}"#);

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
    assert_eq!(config.store.path, "todos.db");
}

#[test]
fn test_unknown_field_in_file_rejected() {
    let file = write_config(".toml", "[server]\nmax_connections = 10\n");

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_unsupported_extension_rejected() {
    let file = write_config(".yaml", "server: {}\n");

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[test]
fn test_optional_file_present_is_loaded() {
    let file = write_config(".toml", "[server]\nshutdown_timeout_secs = 3\n");

    let config = ConfigLoader::new()
        .with_optional_file(file.path())
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(config.server.shutdown_timeout_secs, 3);
}
