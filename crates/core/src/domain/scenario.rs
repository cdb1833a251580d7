use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::landing::LandingResult;
use crate::domain::period::Quarter;
use crate::domain::weights::{validate_weight, WeightMapping};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub String);

impl ScenarioId {
    pub fn generate() -> Self {
        Self(format!("scn-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named what-if weighting kept for later comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationScenario {
    pub id: ScenarioId,
    pub name: String,
    pub year: i32,
    pub quarter: Option<Quarter>,
    pub quotation_weights: WeightMapping,
    pub opportunity_weights: WeightMapping,
    pub landing: LandingResult,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScenario {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub quarter: Option<Quarter>,
    #[serde(default)]
    pub quotation_weights: WeightMapping,
    #[serde(default)]
    pub opportunity_weights: WeightMapping,
    pub landing: LandingResult,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewScenario {
    pub fn into_scenario(
        self,
        created_at: DateTime<Utc>,
    ) -> Result<SimulationScenario, DomainError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidScenario("scenario name must not be empty".into()));
        }
        for (code, weight) in self.quotation_weights.iter().chain(self.opportunity_weights.iter()) {
            validate_weight(code, weight)?;
        }

        Ok(SimulationScenario {
            id: ScenarioId::generate(),
            name,
            year: self.year,
            quarter: self.quarter,
            quotation_weights: self.quotation_weights,
            opportunity_weights: self.opportunity_weights,
            landing: self.landing,
            notes: self.notes.filter(|notes| !notes.trim().is_empty()),
            created_at,
        })
    }
}
