use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::labels::StatusLabels;
use crate::domain::landing::{FunnelSnapshot, LandingView, SimulationOutcome};
use crate::domain::period::PeriodFilter;
use crate::domain::scenario::{NewScenario, ScenarioId, SimulationScenario};
use crate::domain::weights::{WeightEntry, WeightKind, WeightMapping};
use crate::errors::ApplicationError;
use crate::funnel::{
    discover_codes, fetch_records, FunnelDataset, LandingCalculator, LandingPolicy,
};
use crate::ports::{
    CachedSnapshot, CrmDataSource, DataType, ScenarioStore, SnapshotCache, WeightStore,
};

pub const DEFAULT_SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

type KeyGuards = Mutex<HashMap<(DataType, i32), Arc<Mutex<()>>>>;

/// Serves landing figures per period from the snapshot cache, recomputing
/// from the CRM when the snapshot is missing or stale.
pub struct LandingService {
    source: Arc<dyn CrmDataSource>,
    weights: Arc<dyn WeightStore>,
    snapshots: Arc<dyn SnapshotCache>,
    labels: Arc<StatusLabels>,
    policy: LandingPolicy,
    max_age: Duration,
    in_flight: KeyGuards,
}

impl LandingService {
    pub fn new(
        source: Arc<dyn CrmDataSource>,
        weights: Arc<dyn WeightStore>,
        snapshots: Arc<dyn SnapshotCache>,
    ) -> Self {
        Self {
            source,
            weights,
            snapshots,
            labels: Arc::new(StatusLabels::nicoka()),
            policy: LandingPolicy::default(),
            max_age: DEFAULT_SNAPSHOT_MAX_AGE,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: LandingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_labels(mut self, labels: Arc<StatusLabels>) -> Self {
        self.labels = labels;
        self
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    pub fn policy(&self) -> LandingPolicy {
        self.policy
    }

    pub async fn get_landing(&self, period: PeriodFilter) -> Result<LandingView, ApplicationError> {
        let data_type = DataType::for_period(&period);
        if let Some(view) = self.fresh_snapshot(data_type, &period).await {
            return Ok(view);
        }

        let guard = self.key_guard(data_type, period.year).await;
        let _recompute = guard.lock().await;

        // Another request may have refreshed the key while this one waited.
        if let Some(view) = self.fresh_snapshot(data_type, &period).await {
            return Ok(view);
        }

        self.recompute(data_type, period).await
    }

    /// Recomputes regardless of snapshot age. A CRM failure leaves the
    /// existing snapshot untouched.
    pub async fn force_sync(&self, period: PeriodFilter) -> Result<LandingView, ApplicationError> {
        let data_type = DataType::for_period(&period);
        let guard = self.key_guard(data_type, period.year).await;
        let _recompute = guard.lock().await;

        info!(
            event_name = "funnel.landing.sync_requested",
            period = %period,
            "forced landing sync"
        );
        self.recompute(data_type, period).await
    }

    pub async fn last_sync(
        &self,
        period: PeriodFilter,
    ) -> Result<Option<DateTime<Utc>>, ApplicationError> {
        let data_type = DataType::for_period(&period);
        Ok(self.snapshots.last_synced_at(data_type, period.year).await?)
    }

    /// What-if run: the overrides are used as the complete mappings, codes
    /// they omit fall back to the policy defaults. Nothing is persisted.
    pub async fn simulate(
        &self,
        period: PeriodFilter,
        quotation_weights: &WeightMapping,
        opportunity_weights: &WeightMapping,
    ) -> Result<SimulationOutcome, ApplicationError> {
        let quotation_weights = WeightMapping::validated(quotation_weights.iter())?;
        let opportunity_weights = WeightMapping::validated(opportunity_weights.iter())?;

        let records = fetch_records(self.source.as_ref()).await?;
        let dataset = FunnelDataset::build(period, records);
        let landing = self.policy.calculate(&dataset, &quotation_weights, &opportunity_weights);

        info!(
            event_name = "funnel.simulation.completed",
            period = %period,
            landing_total = %landing.landing_total,
            "simulation computed"
        );

        Ok(SimulationOutcome { period, landing, codes: discover_codes(&dataset, &self.labels) })
    }

    pub async fn weights(&self, kind: WeightKind) -> Result<Vec<WeightEntry>, ApplicationError> {
        Ok(self.weights.list(kind).await?)
    }

    pub async fn upsert_weight(
        &self,
        kind: WeightKind,
        code: &str,
        label: &str,
        weight: Decimal,
        description: Option<String>,
    ) -> Result<WeightEntry, ApplicationError> {
        let entry = WeightEntry::new(kind, code, label, weight, description)?;
        self.weights.upsert(entry.clone()).await?;

        info!(
            event_name = "funnel.weights.upserted",
            kind = %kind,
            code = %entry.code,
            weight = %entry.weight,
            "weight updated"
        );
        Ok(entry)
    }

    // Guards only the map still references are idle and get dropped, so the
    // map holds at most the keys currently being recomputed plus this one.
    async fn key_guard(&self, data_type: DataType, year: i32) -> Arc<Mutex<()>> {
        let mut guards = self.in_flight.lock().await;
        guards.retain(|_, guard| Arc::strong_count(guard) > 1);
        Arc::clone(guards.entry((data_type, year)).or_default())
    }

    /// A cache read failure counts as a miss.
    async fn fresh_snapshot(
        &self,
        data_type: DataType,
        period: &PeriodFilter,
    ) -> Option<LandingView> {
        let cached = match self.snapshots.get(data_type, period.year).await {
            Ok(cached) => cached?,
            Err(error) => {
                warn!(
                    event_name = "funnel.landing.cache_unavailable",
                    period = %period,
                    error = %error,
                    "snapshot cache read failed, recomputing"
                );
                return None;
            }
        };

        if !self.is_fresh(&cached, Utc::now()) {
            return None;
        }

        info!(
            event_name = "funnel.landing.cache_hit",
            period = %period,
            synced_at = %cached.synced_at,
            "serving landing from snapshot"
        );
        Some(LandingView { snapshot: cached.data, last_sync: cached.synced_at, from_cache: true })
    }

    fn is_fresh(&self, cached: &CachedSnapshot, now: DateTime<Utc>) -> bool {
        match (now - cached.synced_at).to_std() {
            Ok(age) => age < self.max_age,
            // Stamped in the future.
            Err(_) => true,
        }
    }

    async fn recompute(
        &self,
        data_type: DataType,
        period: PeriodFilter,
    ) -> Result<LandingView, ApplicationError> {
        let records = match fetch_records(self.source.as_ref()).await {
            Ok(records) => records,
            Err(error) => {
                error!(
                    event_name = "funnel.landing.crm_fetch_failed",
                    period = %period,
                    error = %error,
                    "crm fetch failed, snapshot left untouched"
                );
                return Err(error.into());
            }
        };
        let quotation_weights = self.weights.weights(WeightKind::Quotation).await?;
        let opportunity_weights = self.weights.weights(WeightKind::Opportunity).await?;

        let dataset = FunnelDataset::build(period, records);
        let landing = self.policy.calculate(&dataset, &quotation_weights, &opportunity_weights);
        let codes = discover_codes(&dataset, &self.labels);

        let snapshot = FunnelSnapshot {
            period,
            landing,
            orders: dataset.orders,
            quotations: dataset.unique_quotations,
            opportunities: dataset.unique_opportunities,
            period_quotations: dataset.quotations,
            period_opportunities: dataset.opportunities,
            codes,
        };

        let last_sync = match self.snapshots.set(data_type, period.year, &snapshot).await {
            Ok(synced_at) => synced_at,
            Err(error) => {
                warn!(
                    event_name = "funnel.landing.cache_write_failed",
                    period = %period,
                    error = %error,
                    "snapshot could not be stored"
                );
                Utc::now()
            }
        };

        info!(
            event_name = "funnel.landing.recomputed",
            period = %period,
            landing_total = %snapshot.landing.landing_total,
            orders = snapshot.landing.order_count as u64,
            quotations = snapshot.landing.quotation_count as u64,
            opportunities = snapshot.landing.opportunity_count as u64,
            "landing recomputed from crm"
        );

        Ok(LandingView { snapshot, last_sync, from_cache: false })
    }
}

pub struct ScenarioService {
    store: Arc<dyn ScenarioStore>,
}

impl ScenarioService {
    pub fn new(store: Arc<dyn ScenarioStore>) -> Self {
        Self { store }
    }

    pub async fn save(
        &self,
        scenario: NewScenario,
    ) -> Result<SimulationScenario, ApplicationError> {
        let scenario = scenario.into_scenario(Utc::now())?;
        self.store.save(&scenario).await?;
        info!(
            event_name = "funnel.scenario.saved",
            scenario_id = %scenario.id,
            year = scenario.year,
            "simulation scenario saved"
        );
        Ok(scenario)
    }

    pub async fn list(&self) -> Result<Vec<SimulationScenario>, ApplicationError> {
        Ok(self.store.list().await?)
    }

    /// Returns whether a scenario was removed.
    pub async fn delete(&self, id: &ScenarioId) -> Result<bool, ApplicationError> {
        let removed = self.store.delete(id).await?;
        if removed {
            info!(
                event_name = "funnel.scenario.deleted",
                scenario_id = %id,
                "simulation scenario deleted"
            );
        }
        Ok(removed)
    }
}
