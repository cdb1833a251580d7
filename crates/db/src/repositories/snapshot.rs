use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use funnel_core::{CacheError, CachedSnapshot, DataType, FunnelSnapshot, SnapshotCache};
use sqlx::Row;

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

/// Landing snapshots in `funnel_cache`. Each `(data_type, year)` key holds at
/// most one row; writes replace it inside a transaction.
pub struct SqlSnapshotCache {
    pool: DbPool,
}

impl SqlSnapshotCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<CachedSnapshot>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT payload_json, synced_at
            FROM funnel_cache
            WHERE data_type = ? AND year = ?
            ORDER BY synced_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(data_type.as_key())
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String =
            row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let synced_at: String =
            row.try_get("synced_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let data: FunnelSnapshot = serde_json::from_str(&payload).map_err(|err| {
            RepositoryError::Decode(format!("invalid snapshot payload: {err}"))
        })?;

        let synced_at = parse_rfc3339("snapshot synced_at", &synced_at)?;
        Ok(Some(CachedSnapshot { data, synced_at }))
    }

    async fn replace(
        &self,
        data_type: DataType,
        year: i32,
        data: &FunnelSnapshot,
    ) -> Result<DateTime<Utc>, RepositoryError> {
        let payload = serde_json::to_string(data).map_err(|err| {
            RepositoryError::Decode(format!("snapshot payload could not be encoded: {err}"))
        })?;
        // Stored at microsecond precision so a read returns the stamped value.
        let synced_at = Utc::now().trunc_subsecs(6);
        let key = data_type.as_key();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM funnel_cache WHERE data_type = ? AND year = ?")
            .bind(&key)
            .bind(year)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO funnel_cache (data_type, year, payload_json, synced_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(year)
        .bind(payload)
        .bind(synced_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(synced_at)
    }

    async fn latest_sync(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let synced_at: Option<String> = sqlx::query_scalar(
            "SELECT MAX(synced_at) FROM funnel_cache WHERE data_type = ? AND year = ?",
        )
        .bind(data_type.as_key())
        .bind(year)
        .fetch_one(&self.pool)
        .await?;

        synced_at.as_deref().map(|ts| parse_rfc3339("snapshot synced_at", ts)).transpose()
    }
}

#[async_trait]
impl SnapshotCache for SqlSnapshotCache {
    async fn get(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.load(data_type, year).await?)
    }

    async fn set(
        &self,
        data_type: DataType,
        year: i32,
        data: &FunnelSnapshot,
    ) -> Result<DateTime<Utc>, CacheError> {
        Ok(self.replace(data_type, year, data).await?)
    }

    async fn last_synced_at(
        &self,
        data_type: DataType,
        year: i32,
    ) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.latest_sync(data_type, year).await?)
    }
}
