use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.store.path, "~/.horizon/servers.db");
    assert_eq!(config.realtime.outbound_queue_capacity, 64);
    assert_eq!(config.realtime.max_message_size, 4096);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.directory.is_none());
}

#[test]
fn test_server_address() {
    let server = ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 8443,
    };
    assert_eq!(server.address(), "0.0.0.0:8443");
}

#[test]
fn test_partial_section_keeps_defaults() {
    let config: Config = toml::from_str(
        r#"
        [realtime]
        outbound_queue_capacity = 8
        "#,
    )
    .unwrap();
    assert_eq!(config.realtime.outbound_queue_capacity, 8);
    assert_eq!(config.realtime.max_message_size, 4096);
    assert_eq!(config.server.port, 5000);
}

#[test]
fn test_logging_directory() {
    let config: Config = toml::from_str(
        r#"
        [logging]
        level = "debug"
        directory = "/var/log/horizon"
        "#,
    )
    .unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.directory,
        Some(PathBuf::from("/var/log/horizon"))
    );
}

#[test]
fn test_config_serialization_roundtrip() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("[server]"));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.server.port, config.server.port);
}
