//! Capabilities the landing engine consumes. Implementations live in
//! `funnel-crm` (CRM data source) and `funnel-db` (weights, snapshots).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::landing::FunnelSnapshot;
use crate::domain::period::{PeriodFilter, Quarter};
use crate::domain::records::{Customer, Opportunity, Order, Project, Quotation};
use crate::domain::scenario::{ScenarioId, SimulationScenario};
use crate::domain::weights::{WeightEntry, WeightKind, WeightMapping};
use crate::errors::DomainError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("crm request to `{endpoint}` failed: {message}")]
    Unavailable { endpoint: String, message: String },
    #[error("crm throttled `{endpoint}` after {attempts} attempts")]
    Throttled { endpoint: String, attempts: u32 },
    #[error("crm payload from `{endpoint}` could not be decoded: {message}")]
    Decode { endpoint: String, message: String },
    #[error("crm client is not configured: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the sales CRM. Every call is a fresh, complete listing;
/// label and name enrichment is done before records are returned.
#[async_trait]
pub trait CrmDataSource: Send + Sync {
    async fn list_customers(&self) -> Result<Vec<Customer>, SourceError>;
    async fn list_projects(&self) -> Result<Vec<Project>, SourceError>;
    async fn list_quotations(&self) -> Result<Vec<Quotation>, SourceError>;
    async fn list_orders(&self) -> Result<Vec<Order>, SourceError>;
    async fn list_opportunities(&self) -> Result<Vec<Opportunity>, SourceError>;
}

#[async_trait]
pub trait WeightStore: Send + Sync {
    /// Active entries only.
    async fn list(&self, kind: WeightKind) -> Result<Vec<WeightEntry>, StoreError>;
    async fn upsert(&self, entry: WeightEntry) -> Result<(), StoreError>;

    async fn weights(&self, kind: WeightKind) -> Result<WeightMapping, StoreError> {
        let entries = self.list(kind).await?;
        Ok(WeightMapping::from_entries(&entries))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    FunnelSnapshot,
    FunnelQuarterSnapshot(Quarter),
}

impl DataType {
    pub fn for_period(period: &PeriodFilter) -> Self {
        match period.quarter {
            Some(quarter) => Self::FunnelQuarterSnapshot(quarter),
            None => Self::FunnelSnapshot,
        }
    }

    pub fn as_key(&self) -> String {
        match self {
            Self::FunnelSnapshot => "funnel_snapshot".to_string(),
            Self::FunnelQuarterSnapshot(quarter) => {
                format!("funnel_snapshot_q{}", quarter.number())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub data: FunnelSnapshot,
    pub synced_at: DateTime<Utc>,
}

/// Persisted landing results keyed by `(data type, year)`.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, data_type: DataType, year: i32)
        -> Result<Option<CachedSnapshot>, CacheError>;

    /// Replaces any previous snapshot for the key and stamps it with the
    /// current time, which is returned.
    async fn set(
        &self,
        data_type: DataType,
        year: i32,
        data: &FunnelSnapshot,
    ) -> Result<DateTime<Utc>, CacheError>;

    async fn last_synced_at(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<DateTime<Utc>>, CacheError>;
}

#[async_trait]
pub trait ScenarioStore: Send + Sync {
    async fn save(&self, scenario: &SimulationScenario) -> Result<(), StoreError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<SimulationScenario>, StoreError>;
    /// Returns whether a scenario was removed.
    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::DataType;
    use crate::domain::period::{PeriodFilter, Quarter};

    #[test]
    fn data_type_key_encodes_quarter() {
        assert_eq!(DataType::for_period(&PeriodFilter::year(2026)).as_key(), "funnel_snapshot");
        assert_eq!(
            DataType::for_period(&PeriodFilter::quarter(2026, Quarter::Q4)).as_key(),
            "funnel_snapshot_q4"
        );
    }
}
