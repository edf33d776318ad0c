use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use nexus_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_INVALID};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG_INVALID,
            )
        }
    };

    CommandResult { exit_code: 0, output: render(&config) }
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let tool_config_path = config
        .agent
        .tool_config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("llm.provider", format!("{:?}", config.llm.provider), &["NEXUS_LLM_PROVIDER"]),
        Field::new("llm.api_key", api_key, &["NEXUS_LLM_API_KEY", "GROQ_API_KEY"]),
        Field::new("llm.base_url", config.llm.effective_base_url(), &["NEXUS_LLM_BASE_URL"]),
        Field::new("llm.model", config.llm.model.clone(), &["NEXUS_LLM_MODEL"]),
        Field::new(
            "llm.classifier_model",
            config.llm.classifier_model.clone(),
            &["NEXUS_LLM_CLASSIFIER_MODEL"],
        ),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["NEXUS_LLM_TIMEOUT_SECS"],
        ),
        Field::new("agent.tool_config_path", tool_config_path, &["NEXUS_AGENT_TOOL_CONFIG_PATH"]),
        Field::new(
            "agent.run_timeout_secs",
            config.agent.run_timeout_secs.to_string(),
            &["NEXUS_AGENT_RUN_TIMEOUT_SECS"],
        ),
        Field::new(
            "agent.memory_enabled",
            config.agent.memory_enabled.to_string(),
            &["NEXUS_AGENT_MEMORY_ENABLED"],
        ),
        Field::new(
            "agent.max_steps",
            config.agent.max_steps.to_string(),
            &["NEXUS_AGENT_MAX_STEPS"],
        ),
        Field::new("cache.ttl_secs", config.cache.ttl_secs.to_string(), &["NEXUS_CACHE_TTL_SECS"]),
        Field::new("cache.capacity", config.cache.capacity.to_string(), &["NEXUS_CACHE_CAPACITY"]),
        Field::new(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["NEXUS_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["NEXUS_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["NEXUS_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["NEXUS_LOGGING_LEVEL", "NEXUS_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["NEXUS_LOGGING_FORMAT", "NEXUS_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("nexus.toml"), PathBuf::from("config/nexus.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable key prefix (`gsk_`, `sk-`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(['_', '-']) {
        Some(index) if index <= 4 => format!("{}***", &trimmed[..=index]),
        _ => "<redacted>".to_string(),
    }
}
