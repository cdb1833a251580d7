use chrono::{DateTime, Utc};
use funnel_core::{CacheError, StoreError};
use thiserror::Error;

pub mod memory;
pub mod scenario;
pub mod snapshot;
pub mod weights;

pub use memory::{InMemoryScenarioStore, InMemorySnapshotCache, InMemoryWeightStore};
pub use scenario::SqlScenarioStore;
pub use snapshot::SqlSnapshotCache;
pub use weights::SqlWeightStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

impl From<RepositoryError> for CacheError {
    fn from(error: RepositoryError) -> Self {
        CacheError::Unavailable(error.to_string())
    }
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}
