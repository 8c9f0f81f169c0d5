use iris_config::{load_config, load_config_from_file, ConfigFormat, RoutingPolicy};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_yaml_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("iris.yml");

    fs::write(
        &config_path,
        r#"
server:
  port: 9000
backend:
  base_url: "http://localhost:4000"
models:
  default: "deepseek/deepseek-chat"
  sonnet: "moonshotai/kimi-k2"
routing:
  sonnet:
    order: ["groq", "together"]
    allow_fallbacks: false
streaming:
  kimi_buffer_limit: 4096
"#,
    )
    .unwrap();

    let resolved = load_config_from_file(&config_path).unwrap();
    assert_eq!(resolved.format, ConfigFormat::Yaml);

    let config = resolved.config;
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.backend.base_url, "http://localhost:4000");
    assert_eq!(config.models.default, "deepseek/deepseek-chat");
    assert_eq!(config.models.sonnet.as_deref(), Some("moonshotai/kimi-k2"));
    assert_eq!(config.models.opus, None);
    assert_eq!(
        config.routing.sonnet,
        Some(RoutingPolicy {
            order: vec!["groq".to_string(), "together".to_string()],
            allow_fallbacks: false,
        })
    );
    assert_eq!(config.routing.default, None);
    assert_eq!(config.streaming.kimi_buffer_limit, 4096);
}

#[test]
fn test_yaml_json_and_jsonc_agree() {
    let dir = TempDir::new().unwrap();

    let yaml = dir.path().join("iris.yaml");
    fs::write(&yaml, "models:\n  haiku: \"qwen/qwen3-coder\"\n").unwrap();

    let json = dir.path().join("iris.json");
    fs::write(&json, r#"{"models": {"haiku": "qwen/qwen3-coder"}}"#).unwrap();

    let jsonc = dir.path().join("iris.jsonc");
    fs::write(
        &jsonc,
        r#"{
  // cheap tier
  models: { haiku: "qwen/qwen3-coder", },
}"#,
    )
    .unwrap();

    let from_yaml = load_config(Some(&yaml)).unwrap();
    let from_json = load_config(Some(&json)).unwrap();
    let from_jsonc = load_config(Some(&jsonc)).unwrap();

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_json, from_jsonc);
    assert_eq!(from_yaml.models.haiku.as_deref(), Some("qwen/qwen3-coder"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config(Some(&dir.path().join("absent.yml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_unknown_extension_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iris.toml");
    fs::write(&path, "[server]\nport = 1\n").unwrap();

    let err = load_config_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Unknown config format"));
}
