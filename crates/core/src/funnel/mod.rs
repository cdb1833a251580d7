pub mod calculator;
pub mod dedup;

use std::collections::HashSet;

use crate::domain::labels::StatusLabels;
use crate::domain::landing::{CodeLabel, DiscoveredCodes};
use crate::domain::period::PeriodFilter;
use crate::domain::records::{CrmRecords, Opportunity, Order, Quotation};
use crate::ports::{CrmDataSource, SourceError};

pub use calculator::{
    calculate_landing, LandingCalculator, LandingPolicy, DEFAULT_OPPORTUNITY_WEIGHT,
    DEFAULT_QUOTATION_WEIGHT,
};
pub use dedup::{deduplicate, Deduplicated};

/// Working set for one period: filtered lists, their deduplicated
/// quotations and opportunities, and the unfiltered lists used for code
/// discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunnelDataset {
    pub period: PeriodFilter,
    pub orders: Vec<Order>,
    pub quotations: Vec<Quotation>,
    pub opportunities: Vec<Opportunity>,
    pub unique_quotations: Vec<Quotation>,
    pub unique_opportunities: Vec<Opportunity>,
    pub all_orders: Vec<Order>,
    pub all_quotations: Vec<Quotation>,
    pub all_opportunities: Vec<Opportunity>,
}

impl FunnelDataset {
    pub fn build(period: PeriodFilter, records: CrmRecords) -> Self {
        let orders: Vec<Order> = records
            .orders
            .iter()
            .filter(|order| order_in_period(order, &period))
            .cloned()
            .collect();
        let quotations: Vec<Quotation> = records
            .quotations
            .iter()
            .filter(|quotation| quotation_in_period(quotation, &period))
            .cloned()
            .collect();
        let opportunities: Vec<Opportunity> = records
            .opportunities
            .iter()
            .filter(|opportunity| opportunity_in_period(opportunity, &period))
            .cloned()
            .collect();

        let Deduplicated { quotations: unique_quotations, opportunities: unique_opportunities } =
            deduplicate(&orders, &quotations, &opportunities);

        Self {
            period,
            orders,
            quotations,
            opportunities,
            unique_quotations,
            unique_opportunities,
            all_orders: records.orders,
            all_quotations: records.quotations,
            all_opportunities: records.opportunities,
        }
    }
}

pub fn order_in_period(order: &Order, period: &PeriodFilter) -> bool {
    period.includes(&[order.period_end.as_deref(), order.date.as_deref()])
}

pub fn quotation_in_period(quotation: &Quotation, period: &PeriodFilter) -> bool {
    period.includes(&[quotation.period_end.as_deref(), quotation.date.as_deref()])
}

/// Opportunities carry no primary date; the close date is the last resort.
pub fn opportunity_in_period(opportunity: &Opportunity, period: &PeriodFilter) -> bool {
    period.includes(&[opportunity.period_end.as_deref(), opportunity.close_date.as_deref()])
}

/// Quotation statuses and opportunity stages present in the unfiltered
/// lists, in first-seen order. Blank and `"0"` codes are skipped.
pub fn discover_codes(dataset: &FunnelDataset, labels: &StatusLabels) -> DiscoveredCodes {
    DiscoveredCodes {
        quotation_statuses: distinct_codes(
            dataset.all_quotations.iter().map(|quotation| quotation.status.as_str()),
            |code| labels.quotation_status(code),
        ),
        opportunity_stages: distinct_codes(
            dataset.all_opportunities.iter().map(|opportunity| opportunity.stage.as_str()),
            |code| labels.opportunity_stage(code),
        ),
    }
}

fn distinct_codes<'a>(
    codes: impl Iterator<Item = &'a str>,
    label: impl Fn(&str) -> String,
) -> Vec<CodeLabel> {
    let mut seen = HashSet::new();
    codes
        .map(str::trim)
        .filter(|code| !code.is_empty() && *code != "0")
        .filter(|code| seen.insert(code.to_string()))
        .map(|code| CodeLabel { code: code.to_string(), label: label(code) })
        .collect()
}

/// Pulls the three record categories concurrently. Any failure fails the
/// whole fetch; nothing partial is returned.
pub async fn fetch_records(source: &dyn CrmDataSource) -> Result<CrmRecords, SourceError> {
    let (orders, quotations, opportunities) = tokio::try_join!(
        source.list_orders(),
        source.list_quotations(),
        source.list_opportunities()
    )?;
    Ok(CrmRecords { orders, quotations, opportunities })
}
