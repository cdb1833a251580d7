use async_trait::async_trait;
use chrono::SecondsFormat;
use funnel_core::{
    LandingResult, Quarter, ScenarioId, ScenarioStore, SimulationScenario, StoreError,
    WeightMapping,
};
use serde::de::DeserializeOwned;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub id: String,
    pub name: String,
    pub year: i64,
    pub quarter: Option<i64>,
    pub quotation_weights_json: String,
    pub opportunity_weights_json: String,
    pub landing_json: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl ScenarioRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, RepositoryError> {
        let get = |column: &str| -> Result<String, RepositoryError> {
            row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
        };
        Ok(Self {
            id: get("id")?,
            name: get("name")?,
            year: row.try_get("year").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            quarter: row.try_get("quarter").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            quotation_weights_json: get("quotation_weights_json")?,
            opportunity_weights_json: get("opportunity_weights_json")?,
            landing_json: get("landing_json")?,
            notes: row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            created_at: get("created_at")?,
        })
    }
}

impl TryFrom<ScenarioRecord> for SimulationScenario {
    type Error = RepositoryError;

    fn try_from(value: ScenarioRecord) -> Result<Self, Self::Error> {
        let year = i32::try_from(value.year).map_err(|_| {
            RepositoryError::Decode(format!("scenario year `{}` does not fit in i32", value.year))
        })?;
        let quarter = value
            .quarter
            .map(|raw| {
                u8::try_from(raw)
                    .ok()
                    .and_then(|number| Quarter::try_from(number).ok())
                    .ok_or_else(|| RepositoryError::Decode(format!("invalid quarter: {raw}")))
            })
            .transpose()?;

        Ok(Self {
            id: ScenarioId(value.id),
            name: value.name,
            year,
            quarter,
            quotation_weights: parse_json::<WeightMapping>(
                "quotation_weights_json",
                &value.quotation_weights_json,
            )?,
            opportunity_weights: parse_json::<WeightMapping>(
                "opportunity_weights_json",
                &value.opportunity_weights_json,
            )?,
            landing: parse_json::<LandingResult>("landing_json", &value.landing_json)?,
            notes: value.notes,
            created_at: parse_rfc3339("scenario created_at", &value.created_at)?,
        })
    }
}

impl TryFrom<&SimulationScenario> for ScenarioRecord {
    type Error = RepositoryError;

    fn try_from(value: &SimulationScenario) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.0.clone(),
            name: value.name.clone(),
            year: i64::from(value.year),
            quarter: value.quarter.map(|quarter| i64::from(quarter.number())),
            quotation_weights_json: to_json(&value.quotation_weights)?,
            opportunity_weights_json: to_json(&value.opportunity_weights)?,
            landing_json: to_json(&value.landing)?,
            notes: value.notes.clone(),
            // Fixed width so lexical order in SQL matches time order.
            created_at: value.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        })
    }
}

pub struct SqlScenarioStore {
    pool: DbPool,
}

impl SqlScenarioStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: ScenarioRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO simulation_scenario (
                id, name, year, quarter, quotation_weights_json, opportunity_weights_json,
                landing_json, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                year = excluded.year,
                quarter = excluded.quarter,
                quotation_weights_json = excluded.quotation_weights_json,
                opportunity_weights_json = excluded.opportunity_weights_json,
                landing_json = excluded.landing_json,
                notes = excluded.notes
            "#,
        )
        .bind(record.id)
        .bind(record.name)
        .bind(record.year)
        .bind(record.quarter)
        .bind(record.quotation_weights_json)
        .bind(record.opportunity_weights_json)
        .bind(record.landing_json)
        .bind(record.notes)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_newest_first(&self) -> Result<Vec<SimulationScenario>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, year, quarter, quotation_weights_json, opportunity_weights_json,
                   landing_json, notes, created_at
            FROM simulation_scenario
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| SimulationScenario::try_from(ScenarioRecord::from_row(row)?))
            .collect()
    }

    async fn remove(&self, id: &ScenarioId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM simulation_scenario WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScenarioStore for SqlScenarioStore {
    async fn save(&self, scenario: &SimulationScenario) -> Result<(), StoreError> {
        let record = ScenarioRecord::try_from(scenario)?;
        Ok(self.insert(record).await?)
    }

    async fn list(&self) -> Result<Vec<SimulationScenario>, StoreError> {
        Ok(self.list_newest_first().await?)
    }

    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        Ok(self.remove(id).await?)
    }
}

fn parse_json<T: DeserializeOwned>(field: &str, value: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|err| RepositoryError::Decode(format!("invalid {field}: {err}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|err| RepositoryError::Decode(err.to_string()))
}
