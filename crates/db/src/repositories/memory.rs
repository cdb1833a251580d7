use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use funnel_core::{
    validate_weight, CacheError, CachedSnapshot, DataType, FunnelSnapshot, ScenarioId,
    ScenarioStore, SimulationScenario, SnapshotCache, StoreError, WeightEntry, WeightKind,
    WeightStore,
};

#[derive(Default)]
pub struct InMemoryWeightStore {
    entries: RwLock<HashMap<(WeightKind, String), WeightEntry>>,
}

impl InMemoryWeightStore {
    pub fn with_entries(entries: impl IntoIterator<Item = WeightEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| ((entry.kind, entry.code.clone()), entry))
            .collect();
        Self { entries: RwLock::new(entries) }
    }
}

#[async_trait::async_trait]
impl WeightStore for InMemoryWeightStore {
    async fn list(&self, kind: WeightKind) -> Result<Vec<WeightEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut listed: Vec<WeightEntry> = entries
            .values()
            .filter(|entry| entry.kind == kind && entry.active)
            .cloned()
            .collect();
        listed.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(listed)
    }

    async fn upsert(&self, entry: WeightEntry) -> Result<(), StoreError> {
        validate_weight(&entry.code, entry.weight).map_err(StoreError::Domain)?;
        let mut entries = self.entries.write().await;
        entries.insert((entry.kind, entry.code.clone()), entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySnapshotCache {
    snapshots: RwLock<HashMap<(DataType, i32), CachedSnapshot>>,
}

#[async_trait::async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn get(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<CachedSnapshot>, CacheError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&(data_type, year)).cloned())
    }

    async fn set(
        &self,
        data_type: DataType,
        year: i32,
        data: &FunnelSnapshot,
    ) -> Result<DateTime<Utc>, CacheError> {
        let synced_at = Utc::now();
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert((data_type, year), CachedSnapshot { data: data.clone(), synced_at });
        Ok(synced_at)
    }

    async fn last_synced_at(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<DateTime<Utc>>, CacheError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&(data_type, year)).map(|cached| cached.synced_at))
    }
}

#[derive(Default)]
pub struct InMemoryScenarioStore {
    scenarios: RwLock<HashMap<String, SimulationScenario>>,
}

#[async_trait::async_trait]
impl ScenarioStore for InMemoryScenarioStore {
    async fn save(&self, scenario: &SimulationScenario) -> Result<(), StoreError> {
        let mut scenarios = self.scenarios.write().await;
        scenarios.insert(scenario.id.0.clone(), scenario.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SimulationScenario>, StoreError> {
        let scenarios = self.scenarios.read().await;
        let mut listed: Vec<SimulationScenario> = scenarios.values().cloned().collect();
        listed.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(listed)
    }

    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        let mut scenarios = self.scenarios.write().await;
        Ok(scenarios.remove(&id.0).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use funnel_core::{
        DataType, DiscoveredCodes, DomainError, FunnelSnapshot, LandingResult, PeriodFilter,
        ScenarioId, ScenarioStore, SimulationScenario, SnapshotCache, StoreError, WeightEntry,
        WeightKind, WeightMapping, WeightStore,
    };

    use crate::repositories::{InMemoryScenarioStore, InMemorySnapshotCache, InMemoryWeightStore};

    #[tokio::test]
    async fn in_memory_weight_store_upserts_by_kind_and_code() {
        let store = InMemoryWeightStore::with_entries([WeightEntry::new(
            WeightKind::Quotation,
            "2",
            "Ouvert",
            Decimal::new(5, 1),
            None,
        )
        .expect("valid")]);

        let updated =
            WeightEntry::new(WeightKind::Quotation, "2", "Ouvert", Decimal::new(9, 1), None)
                .expect("valid");
        store.upsert(updated).await.expect("upsert");

        let mapping = store.weights(WeightKind::Quotation).await.expect("weights");
        assert_eq!(mapping.get("2"), Some(Decimal::new(9, 1)));
        assert!(store.list(WeightKind::Opportunity).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn in_memory_weight_store_rejects_out_of_range_entry() {
        let store = InMemoryWeightStore::default();
        let mut entry =
            WeightEntry::new(WeightKind::Quotation, "2", "Ouvert", Decimal::new(5, 1), None)
                .expect("valid");
        entry.weight = Decimal::from(5);

        let error = store.upsert(entry).await.expect_err("out of range");
        assert!(matches!(error, StoreError::Domain(DomainError::InvalidWeight { .. })));
        assert!(store.list(WeightKind::Quotation).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn in_memory_snapshot_cache_replaces_per_key() {
        let cache = InMemorySnapshotCache::default();
        let snapshot = FunnelSnapshot {
            period: PeriodFilter::year(2026),
            landing: LandingResult::default(),
            orders: vec![],
            quotations: vec![],
            opportunities: vec![],
            period_quotations: vec![],
            period_opportunities: vec![],
            codes: DiscoveredCodes::default(),
        };

        let first = cache.set(DataType::FunnelSnapshot, 2026, &snapshot).await.expect("set");
        let second = cache.set(DataType::FunnelSnapshot, 2026, &snapshot).await.expect("set");
        assert!(second >= first);

        let cached = cache.get(DataType::FunnelSnapshot, 2026).await.expect("get").expect("hit");
        assert_eq!(cached.synced_at, second);
        assert!(cache.get(DataType::FunnelSnapshot, 2025).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn in_memory_scenario_store_lists_newest_first() {
        let store = InMemoryScenarioStore::default();
        let now = Utc::now();
        for (id, age) in [("scn-a", 10), ("scn-b", 0), ("scn-c", 5)] {
            let scenario = SimulationScenario {
                id: ScenarioId(id.to_string()),
                name: id.to_string(),
                year: 2026,
                quarter: None,
                quotation_weights: WeightMapping::new(),
                opportunity_weights: WeightMapping::new(),
                landing: LandingResult::default(),
                notes: None,
                created_at: now - Duration::minutes(age),
            };
            store.save(&scenario).await.expect("save");
        }

        let ids: Vec<String> =
            store.list().await.expect("list").into_iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec!["scn-b", "scn-c", "scn-a"]);
        assert!(store.delete(&ScenarioId("scn-c".to_string())).await.expect("delete"));
        assert!(!store.delete(&ScenarioId("scn-c".to_string())).await.expect("delete again"));
    }
}
