use std::sync::Arc;

use funnel_core::config::{AppConfig, LoadOptions};
use funnel_core::{ApplicationError, LandingService, StatusLabels};
use funnel_crm::NicokaDataSource;
use funnel_db::{connect_with_settings, migrations, DbPool, SqlSnapshotCache, SqlWeightStore};
use tokio::runtime::Runtime;

use crate::commands::CommandResult;

/// A classified command failure; `error_class` and `exit_code` are part of
/// the CLI contract.
#[derive(Debug)]
pub struct Failure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

impl From<ApplicationError> for Failure {
    fn from(error: ApplicationError) -> Self {
        match &error {
            ApplicationError::Domain(_) => Self::new("invalid_input", error.to_string(), 7),
            ApplicationError::SourceUnavailable(_) | ApplicationError::Configuration(_) => {
                Self::new("crm_unavailable", error.to_string(), 6)
            }
            ApplicationError::CacheUnavailable(_) | ApplicationError::Persistence(_) => {
                Self::new("persistence", error.to_string(), 8)
            }
        }
    }
}

pub fn load_config() -> Result<AppConfig, Failure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        Failure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub fn runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        Failure::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

pub async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
    Ok(pool)
}

pub fn landing_service(config: &AppConfig, pool: &DbPool) -> Result<LandingService, Failure> {
    let labels = StatusLabels::nicoka();
    let source = NicokaDataSource::from_config(&config.crm, labels.clone())
        .map_err(|error| Failure::new("crm_unavailable", error.to_string(), 6))?;

    Ok(LandingService::new(
        Arc::new(source),
        Arc::new(SqlWeightStore::new(pool.clone())),
        Arc::new(SqlSnapshotCache::new(pool.clone())),
    )
    .with_policy(config.landing.policy())
    .with_max_age(config.landing.snapshot_max_age())
    .with_labels(Arc::new(labels)))
}
