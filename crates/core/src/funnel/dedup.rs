use std::collections::HashSet;

use crate::domain::records::{Opportunity, OpportunityId, Order, Quotation, QuotationId};

/// Quotations and opportunities left after removing the ones whose value is
/// already carried by a more advanced linked record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deduplicated {
    pub quotations: Vec<Quotation>,
    pub opportunities: Vec<Opportunity>,
}

/// Link sets come only from the records passed in. Callers pass the
/// period-filtered collections, so a link to an out-of-period order or
/// quotation does not exclude anything.
pub fn deduplicate(
    orders: &[Order],
    quotations: &[Quotation],
    opportunities: &[Opportunity],
) -> Deduplicated {
    let quotations_with_order: HashSet<QuotationId> =
        orders.iter().filter_map(|order| order.quotation_id).collect();
    let opportunities_with_order: HashSet<OpportunityId> =
        orders.iter().filter_map(|order| order.opportunity_id).collect();
    let opportunities_with_quotation: HashSet<OpportunityId> =
        quotations.iter().filter_map(|quotation| quotation.opportunity_id).collect();

    let quotations = quotations
        .iter()
        .filter(|quotation| !quotations_with_order.contains(&quotation.id))
        .cloned()
        .collect();
    let opportunities = opportunities
        .iter()
        .filter(|opportunity| {
            !opportunities_with_order.contains(&opportunity.id)
                && !opportunities_with_quotation.contains(&opportunity.id)
        })
        .cloned()
        .collect();

    Deduplicated { quotations, opportunities }
}
