use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use funnel_core::{validate_weight, StoreError, WeightEntry, WeightKind, WeightStore};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

/// Admin-editable weights in `landing_weight`, keyed by `(kind, code)`.
pub struct SqlWeightStore {
    pool: DbPool,
}

impl SqlWeightStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn list_active(&self, kind: WeightKind) -> Result<Vec<WeightEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT kind, code, label, weight, description, active
            FROM landing_weight
            WHERE kind = ? AND active = 1
            ORDER BY code ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn save(&self, entry: &WeightEntry) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO landing_weight
                (kind, code, label, weight, description, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(kind, code) DO UPDATE SET
                label = excluded.label,
                weight = excluded.weight,
                description = excluded.description,
                active = excluded.active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entry.kind.as_str())
        .bind(&entry.code)
        .bind(&entry.label)
        .bind(entry.weight.to_string())
        .bind(entry.description.as_deref())
        .bind(i64::from(entry.active))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WeightStore for SqlWeightStore {
    async fn list(&self, kind: WeightKind) -> Result<Vec<WeightEntry>, StoreError> {
        Ok(self.list_active(kind).await?)
    }

    async fn upsert(&self, entry: WeightEntry) -> Result<(), StoreError> {
        validate_weight(&entry.code, entry.weight).map_err(StoreError::Domain)?;
        Ok(self.save(&entry).await?)
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<WeightEntry, RepositoryError> {
    let kind_raw: String = decode(row, "kind")?;
    let kind = WeightKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid weight kind: {kind_raw}")))?;
    let weight_raw: String = decode(row, "weight")?;
    let weight = Decimal::from_str(&weight_raw).map_err(|err| {
        RepositoryError::Decode(format!("invalid weight '{weight_raw}': {err}"))
    })?;
    let active: i64 = decode(row, "active")?;

    Ok(WeightEntry {
        kind,
        code: decode(row, "code")?,
        label: decode(row, "label")?,
        weight,
        description: decode(row, "description")?,
        active: active != 0,
    })
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use funnel_core::{DomainError, StoreError, WeightEntry, WeightKind, WeightStore};
    use rust_decimal::Decimal;

    use super::SqlWeightStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn entry(kind: WeightKind, code: &str, label: &str, tenths: i64) -> WeightEntry {
        WeightEntry::new(kind, code, label, Decimal::new(tenths, 1), None).expect("valid entry")
    }

    #[tokio::test]
    async fn upsert_then_list_returns_entries_by_kind_ordered_by_code() {
        let pool = setup_pool().await;
        let store = SqlWeightStore::new(pool.clone());

        store.upsert(entry(WeightKind::Quotation, "4", "Publié", 6)).await.expect("save 4");
        store.upsert(entry(WeightKind::Quotation, "2", "Ouvert", 5)).await.expect("save 2");
        store.upsert(entry(WeightKind::Opportunity, "2", "Qualifié", 3)).await.expect("save opp");

        let quotations = store.list(WeightKind::Quotation).await.expect("list");
        let codes: Vec<&str> = quotations.iter().map(|entry| entry.code.as_str()).collect();
        assert_eq!(codes, vec!["2", "4"]);
        assert_eq!(quotations[1].weight, Decimal::new(6, 1));
        assert_eq!(quotations[1].label, "Publié");

        let opportunities = store.list(WeightKind::Opportunity).await.expect("list");
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].kind, WeightKind::Opportunity);

        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_replaces_existing_code() {
        let pool = setup_pool().await;
        let store = SqlWeightStore::new(pool.clone());

        store.upsert(entry(WeightKind::Quotation, "2", "Ouvert", 5)).await.expect("first");
        let mut updated = entry(WeightKind::Quotation, "2", "Ouvert (relancé)", 7);
        updated.description = Some("Relance client faite".to_string());
        store.upsert(updated).await.expect("second");

        let entries = store.list(WeightKind::Quotation).await.expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].weight, Decimal::new(7, 1));
        assert_eq!(entries[0].label, "Ouvert (relancé)");
        assert_eq!(entries[0].description.as_deref(), Some("Relance client faite"));

        let mapping = store.weights(WeightKind::Quotation).await.expect("mapping");
        assert_eq!(mapping.get("2"), Some(Decimal::new(7, 1)));

        pool.close().await;
    }

    #[tokio::test]
    async fn out_of_range_entry_is_rejected_before_storage() {
        let pool = setup_pool().await;
        let store = SqlWeightStore::new(pool.clone());

        let mut bypassed = entry(WeightKind::Quotation, "2", "Ouvert", 5);
        bypassed.weight = Decimal::from(5);
        let error = store.upsert(bypassed).await.expect_err("weight above one");
        assert!(matches!(
            error,
            StoreError::Domain(DomainError::InvalidWeight { ref code, .. }) if code == "2"
        ));

        let mut negative = entry(WeightKind::Opportunity, "3", "Proposition", 3);
        negative.weight = Decimal::new(-1, 1);
        assert!(store.upsert(negative).await.is_err());

        assert!(store.list(WeightKind::Quotation).await.expect("list").is_empty());
        assert!(store.list(WeightKind::Opportunity).await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn schema_rejects_out_of_range_weight_written_directly() {
        let pool = setup_pool().await;
        let result = sqlx::query(
            "INSERT INTO landing_weight (kind, code, label, weight, created_at, updated_at)
             VALUES ('quotation', '2', 'Ouvert', '1.5', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());

        pool.close().await;
    }

    #[tokio::test]
    async fn inactive_rows_are_not_listed() {
        let pool = setup_pool().await;
        let store = SqlWeightStore::new(pool.clone());

        store.upsert(entry(WeightKind::Opportunity, "1", "Prospect", 1)).await.expect("save");
        sqlx::query("UPDATE landing_weight SET active = 0 WHERE code = '1'")
            .execute(&pool)
            .await
            .expect("deactivate");

        let entries = store.list(WeightKind::Opportunity).await.expect("list");
        assert!(entries.is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn undecodable_weight_surfaces_as_store_error() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO landing_weight (kind, code, label, weight, created_at, updated_at)
             VALUES ('quotation', '2', 'Ouvert', 'beaucoup', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let store = SqlWeightStore::new(pool.clone());
        let error = store.list(WeightKind::Quotation).await.expect_err("bad weight");
        assert!(error.to_string().contains("beaucoup"));

        pool.close().await;
    }
}
