use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use funnel_core::config::AppConfig;
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::support::load_config;
use crate::commands::CommandResult;

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Effective configuration, one entry per key with where the value came from.
pub fn run() -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result(COMMAND),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<ConfigEntry> = effective_values(&config)
        .into_iter()
        .map(|(key, value, env_key)| ConfigEntry {
            key,
            value,
            source: field_source(
                key,
                env_key,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect();

    CommandResult::success_with(
        COMMAND,
        "effective config (source precedence: env > file > default)",
        entries,
    )
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    let token = config
        .crm
        .api_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        ("database.url", config.database.url.clone(), "FUNNEL_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "FUNNEL_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "FUNNEL_DATABASE_TIMEOUT_SECS",
        ),
        ("crm.subdomain", config.crm.subdomain.clone(), "FUNNEL_CRM_SUBDOMAIN"),
        ("crm.base_url", config.crm.resolved_base_url(), "FUNNEL_CRM_BASE_URL"),
        ("crm.api_token", token, "FUNNEL_CRM_API_TOKEN"),
        ("crm.page_size", config.crm.page_size.to_string(), "FUNNEL_CRM_PAGE_SIZE"),
        (
            "crm.rate_limit_delay_ms",
            config.crm.rate_limit_delay_ms.to_string(),
            "FUNNEL_CRM_RATE_LIMIT_DELAY_MS",
        ),
        ("crm.retry_delay_ms", config.crm.retry_delay_ms.to_string(), "FUNNEL_CRM_RETRY_DELAY_MS"),
        ("crm.max_retries", config.crm.max_retries.to_string(), "FUNNEL_CRM_MAX_RETRIES"),
        (
            "crm.reference_ttl_secs",
            config.crm.reference_ttl_secs.to_string(),
            "FUNNEL_CRM_REFERENCE_TTL_SECS",
        ),
        (
            "landing.snapshot_max_age_secs",
            config.landing.snapshot_max_age_secs.to_string(),
            "FUNNEL_LANDING_SNAPSHOT_MAX_AGE_SECS",
        ),
        (
            "landing.default_quotation_weight",
            config.landing.default_quotation_weight.to_string(),
            "FUNNEL_LANDING_DEFAULT_QUOTATION_WEIGHT",
        ),
        (
            "landing.default_opportunity_weight",
            config.landing.default_opportunity_weight.to_string(),
            "FUNNEL_LANDING_DEFAULT_OPPORTUNITY_WEIGHT",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "FUNNEL_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "FUNNEL_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "FUNNEL_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "FUNNEL_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "FUNNEL_LOGGING_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("funnel.toml"), PathBuf::from("config/funnel.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
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

// Shows at most the first four characters of a token.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    if prefix.len() == trimmed.len() {
        return "<redacted>".to_string();
    }
    format!("{prefix}***")
}
