use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::PeriodFilter;
use crate::domain::records::{Opportunity, Order, Quotation};

/// Raw and weighted totals for one period.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingResult {
    pub orders_total: Decimal,
    pub orders_invoiced: Decimal,
    pub orders_remaining: Decimal,
    pub quotations_raw_total: Decimal,
    pub quotations_weighted_total: Decimal,
    pub opportunities_raw_total: Decimal,
    pub opportunities_weighted_total: Decimal,
    pub landing_total: Decimal,
    pub order_count: usize,
    pub quotation_count: usize,
    pub opportunity_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLabel {
    pub code: String,
    pub label: String,
}

/// Status and stage codes present in the unfiltered lists, first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCodes {
    pub quotation_statuses: Vec<CodeLabel>,
    pub opportunity_stages: Vec<CodeLabel>,
}

/// What gets persisted per `(data type, year)` key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelSnapshot {
    pub period: PeriodFilter,
    pub landing: LandingResult,
    pub orders: Vec<Order>,
    pub quotations: Vec<Quotation>,
    pub opportunities: Vec<Opportunity>,
    pub period_quotations: Vec<Quotation>,
    pub period_opportunities: Vec<Opportunity>,
    pub codes: DiscoveredCodes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingView {
    #[serde(flatten)]
    pub snapshot: FunnelSnapshot,
    pub last_sync: DateTime<Utc>,
    pub from_cache: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub period: PeriodFilter,
    pub landing: LandingResult,
    pub codes: DiscoveredCodes,
}
