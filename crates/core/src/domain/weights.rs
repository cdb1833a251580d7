use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightKind {
    Quotation,
    Opportunity,
}

impl WeightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quotation => "quotation",
            Self::Opportunity => "opportunity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quotation" | "quotations" => Some(Self::Quotation),
            "opportunity" | "opportunities" => Some(Self::Opportunity),
            _ => None,
        }
    }
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_weight(code: &str, weight: Decimal) -> Result<(), DomainError> {
    if weight < Decimal::ZERO || weight > Decimal::ONE {
        return Err(DomainError::InvalidWeight { code: code.to_string(), weight });
    }
    Ok(())
}

/// One configured confidence coefficient for a status or stage code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub kind: WeightKind,
    pub code: String,
    pub label: String,
    pub weight: Decimal,
    pub description: Option<String>,
    pub active: bool,
}

impl WeightEntry {
    pub fn new(
        kind: WeightKind,
        code: impl Into<String>,
        label: impl Into<String>,
        weight: Decimal,
        description: Option<String>,
    ) -> Result<Self, DomainError> {
        let code = code.into().trim().to_string();
        if code.is_empty() {
            return Err(DomainError::InvariantViolation("weight code must not be empty".into()));
        }
        validate_weight(&code, weight)?;

        Ok(Self {
            kind,
            code,
            label: label.into(),
            weight,
            description: description.filter(|value| !value.trim().is_empty()),
            active: true,
        })
    }
}

/// Status/stage code to weight. Lookups never fail; the caller supplies the
/// fallback for codes that have no entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightMapping(BTreeMap<String, Decimal>);

impl WeightMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping, rejecting any weight outside `[0, 1]`.
    pub fn validated<I, K>(entries: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: Into<String>,
    {
        let mut mapping = Self::new();
        for (code, weight) in entries {
            let code = code.into();
            validate_weight(&code, weight)?;
            mapping.0.insert(code, weight);
        }
        Ok(mapping)
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a WeightEntry>) -> Self {
        Self(
            entries
                .into_iter()
                .filter(|entry| entry.active)
                .map(|entry| (entry.code.clone(), entry.weight))
                .collect(),
        )
    }

    pub fn insert(&mut self, code: impl Into<String>, weight: Decimal) -> Option<Decimal> {
        self.0.insert(code.into(), weight)
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.0.get(code).copied()
    }

    pub fn weight_for(&self, code: &str, fallback: Decimal) -> Decimal {
        self.get(code).unwrap_or(fallback)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(code, weight)| (code.as_str(), *weight))
    }
}

impl<K: Into<String>> FromIterator<(K, Decimal)> for WeightMapping {
    fn from_iter<T: IntoIterator<Item = (K, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(code, weight)| (code.into(), weight)).collect())
    }
}
