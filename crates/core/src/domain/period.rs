use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn number(self) -> u8 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    /// Calendar quarter of a 1-based month.
    pub fn of_month(month: u32) -> Option<Self> {
        match month {
            1..=3 => Some(Self::Q1),
            4..=6 => Some(Self::Q2),
            7..=9 => Some(Self::Q3),
            10..=12 => Some(Self::Q4),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Quarter {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Q1),
            2 => Ok(Self::Q2),
            3 => Ok(Self::Q3),
            4 => Ok(Self::Q4),
            other => {
                Err(DomainError::InvalidPeriod(format!("quarter must be in 1..=4, got {other}")))
            }
        }
    }
}

impl From<Quarter> for u8 {
    fn from(value: Quarter) -> Self {
        value.number()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// A calendar year, optionally narrowed to one quarter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodFilter {
    pub year: i32,
    pub quarter: Option<Quarter>,
}

impl PeriodFilter {
    pub fn year(year: i32) -> Self {
        Self { year, quarter: None }
    }

    pub fn quarter(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter: Some(quarter) }
    }

    pub fn new(year: i32, quarter: Option<u8>) -> Result<Self, DomainError> {
        let quarter = quarter.map(Quarter::try_from).transpose()?;
        Ok(Self { year, quarter })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if date.year() != self.year {
            return false;
        }

        match self.quarter {
            Some(quarter) => Quarter::of_month(date.month()) == Some(quarter),
            None => true,
        }
    }

    /// Applies the date-precedence rule and then the window check.
    ///
    /// The first non-empty candidate is the one that counts; if it does not
    /// parse, the record is out of every period.
    pub fn includes(&self, candidates: &[Option<&str>]) -> bool {
        resolve_date(candidates).map(|date| self.contains(date)).unwrap_or(false)
    }
}

impl fmt::Display for PeriodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(quarter) => write!(f, "{}-{quarter}", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

pub fn resolve_date(candidates: &[Option<&str>]) -> Option<NaiveDate> {
    let raw = candidates
        .iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())?;
    parse_record_date(raw)
}

/// Calendar date exactly as written in the serialized value. Offsets are
/// kept, never converted, so the same string always yields the same date.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_time.naive_local().date());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|date_time| date_time.date())
}
