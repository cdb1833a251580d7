use std::sync::Arc;

use funnel_core::config::{AppConfig, ConfigError, LoadOptions};
use funnel_core::{LandingService, ScenarioService, SourceError, StatusLabels};
use funnel_crm::NicokaDataSource;
use funnel_db::{
    connect_with_settings, migrations, DbPool, SqlScenarioStore, SqlSnapshotCache, SqlWeightStore,
};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState {
            db_pool: self.db_pool.clone(),
            crm_configured: self.config.crm.api_token.is_some(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("crm client setup failed: {0}")]
    Crm(#[source] SourceError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "funnel.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "funnel.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "funnel.bootstrap.migrations_applied", "database migrations applied");

    let labels = StatusLabels::nicoka();
    let source = NicokaDataSource::from_config(&config.crm, labels.clone())
        .map_err(BootstrapError::Crm)?;
    let landing = LandingService::new(
        Arc::new(source),
        Arc::new(SqlWeightStore::new(db_pool.clone())),
        Arc::new(SqlSnapshotCache::new(db_pool.clone())),
    )
    .with_policy(config.landing.policy())
    .with_max_age(config.landing.snapshot_max_age())
    .with_labels(Arc::new(labels));
    let scenarios = ScenarioService::new(Arc::new(SqlScenarioStore::new(db_pool.clone())));

    info!(
        event_name = "funnel.bootstrap.ready",
        crm_base_url = %config.crm.resolved_base_url(),
        crm_configured = config.crm.api_token.is_some(),
        "landing services wired"
    );

    Ok(Application {
        config,
        db_pool,
        api: ApiState { landing: Arc::new(landing), scenarios: Arc::new(scenarios) },
    })
}
