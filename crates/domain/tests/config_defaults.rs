use ei_domain::config::{Config, ConfigSeverity, ModelProvider, Persona};

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_quota_and_storage() {
    let config = Config::default();
    assert_eq!(config.quota.anonymous_message_limit, 2);
    assert_eq!(config.storage.state_path, std::path::PathBuf::from("./data"));
    assert!(config.tools.knowledge_dir.is_none());
    assert_eq!(config.auth.secret_env, "EI_AUTH_SECRET");
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8088

[llm]
default_timeout_ms = 30000

[[llm.providers]]
id = "deepseek"
base_url = "https://api.deepseek.com"
auth = { env = "DEEPSEEK_API_KEY" }

[[llm.providers]]
id = "doubao"
base_url = "https://ark.cn-beijing.volces.com/api/v3"
auth = { env = "DOUBAO_API_KEY" }

[pipeline]
default_provider = "doubao"

[pipeline.persona_providers]
empathetic = "deepseek"

[quota]
anonymous_message_limit = 5

[auth]
privileged_emails = ["admin@example.com"]

[tools]
knowledge_dir = "./kb"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.llm.providers.len(), 2);
    assert_eq!(config.pipeline.default_provider, ModelProvider::Doubao);
    assert_eq!(
        config.pipeline.persona_providers.for_persona(Persona::Empathetic),
        ModelProvider::Deepseek
    );
    assert_eq!(config.quota.anonymous_message_limit, 5);
    assert!(config.auth.is_privileged("1", Some("admin@example.com")));
    assert!(config.validate().is_empty());
}

#[test]
fn zero_port_is_an_error() {
    let config: Config = toml::from_str("[server]\nport = 0\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
}

#[test]
fn missing_provider_id_is_a_warning() {
    let toml_str = r#"
[[llm.providers]]
id = "deepseek"
base_url = "https://api.deepseek.com"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "llm.providers" && e.severity == ConfigSeverity::Warning));
    assert!(!issues.iter().any(|e| e.severity == ConfigSeverity::Error));
}

#[test]
fn cors_wildcard_warns() {
    let config: Config =
        toml::from_str("[server.cors]\nallowed_origins = [\"*\"]\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "server.cors.allowed_origins"));
}
