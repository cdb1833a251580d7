use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::funnel::{LandingPolicy, DEFAULT_OPPORTUNITY_WEIGHT, DEFAULT_QUOTATION_WEIGHT};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub crm: CrmConfig,
    pub landing: LandingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub subdomain: String,
    pub base_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub page_size: u32,
    pub rate_limit_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub reference_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LandingConfig {
    pub snapshot_max_age_secs: u64,
    pub default_quotation_weight: Decimal,
    pub default_opportunity_weight: Decimal,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub crm_subdomain: Option<String>,
    pub crm_base_url: Option<String>,
    pub crm_api_token: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://funnel.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            crm: CrmConfig {
                subdomain: "rubix-consulting".to_string(),
                base_url: None,
                api_token: None,
                page_size: 200,
                rate_limit_delay_ms: 100,
                retry_delay_ms: 500,
                max_retries: 3,
                reference_ttl_secs: 600,
            },
            landing: LandingConfig {
                snapshot_max_age_secs: 30 * 60,
                default_quotation_weight: DEFAULT_QUOTATION_WEIGHT,
                default_opportunity_weight: DEFAULT_OPPORTUNITY_WEIGHT,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CrmConfig {
    /// Explicit `base_url` wins; otherwise derived from the subdomain.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(base_url) => base_url.trim_end_matches('/').to_string(),
            None => format!("https://{}.nicoka.com/api", self.subdomain),
        }
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn reference_ttl(&self) -> Duration {
        Duration::from_secs(self.reference_ttl_secs)
    }
}

impl LandingConfig {
    pub fn snapshot_max_age(&self) -> Duration {
        Duration::from_secs(self.snapshot_max_age_secs)
    }

    pub fn policy(&self) -> LandingPolicy {
        LandingPolicy {
            default_quotation_weight: self.default_quotation_weight,
            default_opportunity_weight: self.default_opportunity_weight,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("funnel.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(subdomain) = crm.subdomain {
                self.crm.subdomain = subdomain;
            }
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = Some(base_url);
            }
            if let Some(api_token) = crm.api_token {
                self.crm.api_token = Some(secret_value(api_token));
            }
            if let Some(page_size) = crm.page_size {
                self.crm.page_size = page_size;
            }
            if let Some(rate_limit_delay_ms) = crm.rate_limit_delay_ms {
                self.crm.rate_limit_delay_ms = rate_limit_delay_ms;
            }
            if let Some(retry_delay_ms) = crm.retry_delay_ms {
                self.crm.retry_delay_ms = retry_delay_ms;
            }
            if let Some(max_retries) = crm.max_retries {
                self.crm.max_retries = max_retries;
            }
            if let Some(reference_ttl_secs) = crm.reference_ttl_secs {
                self.crm.reference_ttl_secs = reference_ttl_secs;
            }
        }

        if let Some(landing) = patch.landing {
            if let Some(snapshot_max_age_secs) = landing.snapshot_max_age_secs {
                self.landing.snapshot_max_age_secs = snapshot_max_age_secs;
            }
            if let Some(weight) = landing.default_quotation_weight {
                self.landing.default_quotation_weight = weight;
            }
            if let Some(weight) = landing.default_opportunity_weight {
                self.landing.default_opportunity_weight = weight;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FUNNEL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FUNNEL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("FUNNEL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FUNNEL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FUNNEL_CRM_SUBDOMAIN") {
            self.crm.subdomain = value;
        }
        if let Some(value) = read_env("FUNNEL_CRM_BASE_URL") {
            self.crm.base_url = Some(value);
        }
        if let Some(value) = read_env("FUNNEL_CRM_API_TOKEN") {
            self.crm.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("FUNNEL_CRM_PAGE_SIZE") {
            self.crm.page_size = parse_u32("FUNNEL_CRM_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_CRM_RATE_LIMIT_DELAY_MS") {
            self.crm.rate_limit_delay_ms = parse_u64("FUNNEL_CRM_RATE_LIMIT_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_CRM_RETRY_DELAY_MS") {
            self.crm.retry_delay_ms = parse_u64("FUNNEL_CRM_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_CRM_MAX_RETRIES") {
            self.crm.max_retries = parse_u32("FUNNEL_CRM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_CRM_REFERENCE_TTL_SECS") {
            self.crm.reference_ttl_secs = parse_u64("FUNNEL_CRM_REFERENCE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("FUNNEL_LANDING_SNAPSHOT_MAX_AGE_SECS") {
            self.landing.snapshot_max_age_secs =
                parse_u64("FUNNEL_LANDING_SNAPSHOT_MAX_AGE_SECS", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_LANDING_DEFAULT_QUOTATION_WEIGHT") {
            self.landing.default_quotation_weight =
                parse_decimal("FUNNEL_LANDING_DEFAULT_QUOTATION_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_LANDING_DEFAULT_OPPORTUNITY_WEIGHT") {
            self.landing.default_opportunity_weight =
                parse_decimal("FUNNEL_LANDING_DEFAULT_OPPORTUNITY_WEIGHT", &value)?;
        }

        if let Some(value) = read_env("FUNNEL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FUNNEL_SERVER_PORT") {
            self.server.port = parse_u16("FUNNEL_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FUNNEL_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FUNNEL_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("FUNNEL_LOGGING_LEVEL").or_else(|| read_env("FUNNEL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FUNNEL_LOGGING_FORMAT").or_else(|| read_env("FUNNEL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(subdomain) = overrides.crm_subdomain {
            self.crm.subdomain = subdomain;
        }
        if let Some(base_url) = overrides.crm_base_url {
            self.crm.base_url = Some(base_url);
        }
        if let Some(api_token) = overrides.crm_api_token {
            self.crm.api_token = Some(secret_value(api_token));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_crm(&self.crm)?;
        validate_landing(&self.landing)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("funnel.toml"), PathBuf::from("config/funnel.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

// The api token may be absent here; the CRM client rejects fetches without one.
fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    let subdomain_ok = !crm.subdomain.trim().is_empty()
        && crm.subdomain.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
    if crm.base_url.is_none() && !subdomain_ok {
        return Err(ConfigError::Validation(
            "crm.subdomain must be a non-empty hostname label (letters, digits, `-`)".to_string(),
        ));
    }

    if let Some(base_url) = &crm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "crm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if let Some(token) = &crm.api_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "crm.api_token is set but empty. Generate one in Nicoka > Settings > API"
                    .to_string(),
            ));
        }
    }

    if crm.page_size == 0 || crm.page_size > 1000 {
        return Err(ConfigError::Validation(
            "crm.page_size must be in range 1..=1000".to_string(),
        ));
    }

    if crm.max_retries == 0 {
        return Err(ConfigError::Validation(
            "crm.max_retries must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_landing(landing: &LandingConfig) -> Result<(), ConfigError> {
    if landing.snapshot_max_age_secs == 0 {
        return Err(ConfigError::Validation(
            "landing.snapshot_max_age_secs must be greater than zero".to_string(),
        ));
    }

    for (key, weight) in [
        ("landing.default_quotation_weight", landing.default_quotation_weight),
        ("landing.default_opportunity_weight", landing.default_opportunity_weight),
    ] {
        if weight < Decimal::ZERO || weight > Decimal::ONE {
            return Err(ConfigError::Validation(format!(
                "{key} must be between 0 and 1, got {weight}"
            )));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    crm: Option<CrmPatch>,
    landing: Option<LandingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    subdomain: Option<String>,
    base_url: Option<String>,
    api_token: Option<String>,
    page_size: Option<u32>,
    rate_limit_delay_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    reference_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LandingPatch {
    snapshot_max_age_secs: Option<u64>,
    default_quotation_weight: Option<Decimal>,
    default_opportunity_weight: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_nicoka_conventions() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.crm.resolved_base_url() == "https://rubix-consulting.nicoka.com/api",
            "base url should derive from default subdomain",
        )?;
        ensure(config.crm.page_size == 200, "page size should default to 200")?;
        ensure(config.crm.max_retries == 3, "retries should default to 3")?;
        ensure(config.crm.api_token.is_none(), "token is optional at load time")?;
        ensure(config.landing.snapshot_max_age_secs == 1800, "snapshots stay fresh 30 minutes")?;
        ensure(
            config.landing.policy().default_quotation_weight == Decimal::new(5, 1),
            "quotation fallback should be 0.5",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_NICOKA_TOKEN", "tok-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("funnel.toml");
            fs::write(
                &path,
                r#"
[crm]
subdomain = "acme"
api_token = "${TEST_NICOKA_TOKEN}"

[landing]
default_opportunity_weight = 0.25
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let token = config.crm.api_token.as_ref().map(|token| token.expose_secret().to_string());
            ensure(token.as_deref() == Some("tok-from-env"), "token should come from environment")?;
            ensure(
                config.crm.resolved_base_url() == "https://acme.nicoka.com/api",
                "subdomain should drive the base url",
            )?;
            ensure(
                config.landing.default_opportunity_weight == Decimal::new(25, 2),
                "opportunity fallback should be read from file",
            )
        })();

        clear_vars(&["TEST_NICOKA_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FUNNEL_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("FUNNEL_CRM_API_TOKEN", "tok-from-env");
        env::set_var("FUNNEL_LOG_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("funnel.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[crm]
api_token = "tok-from-file"
base_url = "http://127.0.0.1:9999/api/"

[server]
port = 9090
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "warn", "env log level alias should apply")?;
            ensure(config.server.port == 9090, "file port should win over default")?;
            ensure(
                config.crm.api_token.as_ref().map(|t| t.expose_secret() == "tok-from-env")
                    == Some(true),
                "env token should win over file",
            )?;
            ensure(
                config.crm.resolved_base_url() == "http://127.0.0.1:9999/api",
                "explicit base url should win and lose its trailing slash",
            )
        })();

        clear_vars(&["FUNNEL_DATABASE_URL", "FUNNEL_CRM_API_TOKEN", "FUNNEL_LOG_LEVEL"]);
        result
    }

    #[test]
    fn out_of_range_default_weight_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FUNNEL_LANDING_DEFAULT_QUOTATION_WEIGHT", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("landing.default_quotation_weight")
            );
            ensure(has_message, "validation failure should name the weight key")
        })();

        clear_vars(&["FUNNEL_LANDING_DEFAULT_QUOTATION_WEIGHT"]);
        result
    }

    #[test]
    fn malformed_env_number_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FUNNEL_CRM_PAGE_SIZE", "lots");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected env parse failure".to_string())?;
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "FUNNEL_CRM_PAGE_SIZE"),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["FUNNEL_CRM_PAGE_SIZE"]);
        result
    }

    #[test]
    fn api_token_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FUNNEL_CRM_API_TOKEN", "nicoka-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("nicoka-secret-value"), "debug output should not contain token")
        })();

        clear_vars(&["FUNNEL_CRM_API_TOKEN"]);
        result
    }
}
