use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::landing::LandingResult;
use crate::domain::weights::WeightMapping;
use crate::funnel::FunnelDataset;

/// Weight applied to a quotation whose status has no configured entry.
pub const DEFAULT_QUOTATION_WEIGHT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
/// Weight applied to an opportunity whose stage has no configured entry.
pub const DEFAULT_OPPORTUNITY_WEIGHT: Decimal = Decimal::from_parts(3, 0, 0, false, 1);

pub trait LandingCalculator: Send + Sync {
    fn calculate(
        &self,
        dataset: &FunnelDataset,
        quotation_weights: &WeightMapping,
        opportunity_weights: &WeightMapping,
    ) -> LandingResult;
}

/// Fallback weights for unmapped codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingPolicy {
    pub default_quotation_weight: Decimal,
    pub default_opportunity_weight: Decimal,
}

impl Default for LandingPolicy {
    fn default() -> Self {
        Self {
            default_quotation_weight: DEFAULT_QUOTATION_WEIGHT,
            default_opportunity_weight: DEFAULT_OPPORTUNITY_WEIGHT,
        }
    }
}

impl LandingCalculator for LandingPolicy {
    fn calculate(
        &self,
        dataset: &FunnelDataset,
        quotation_weights: &WeightMapping,
        opportunity_weights: &WeightMapping,
    ) -> LandingResult {
        let orders_total = sum(dataset.orders.iter().map(|order| order.gross_total));
        let orders_invoiced = sum(dataset.orders.iter().map(|order| order.total_invoiced));
        let orders_remaining = sum(dataset.orders.iter().map(|order| order.still_to_invoice));

        let quotations_raw_total =
            sum(dataset.unique_quotations.iter().map(|quotation| quotation.gross_total));
        let quotations_weighted_total = sum(dataset.unique_quotations.iter().map(|quotation| {
            quotation.gross_total.saturating_mul(
                quotation_weights.weight_for(&quotation.status, self.default_quotation_weight),
            )
        }));

        let opportunities_raw_total =
            sum(dataset.unique_opportunities.iter().map(|opportunity| opportunity.amount));
        let opportunities_weighted_total =
            sum(dataset.unique_opportunities.iter().map(|opportunity| {
                opportunity.amount.saturating_mul(
                    opportunity_weights
                        .weight_for(&opportunity.stage, self.default_opportunity_weight),
                )
            }));

        LandingResult {
            orders_total,
            orders_invoiced,
            orders_remaining,
            quotations_raw_total,
            quotations_weighted_total,
            opportunities_raw_total,
            opportunities_weighted_total,
            landing_total: orders_total
                .saturating_add(quotations_weighted_total)
                .saturating_add(opportunities_weighted_total),
            order_count: dataset.orders.len(),
            quotation_count: dataset.unique_quotations.len(),
            opportunity_count: dataset.unique_opportunities.len(),
        }
    }
}

/// Calculates with the built-in fallback weights.
pub fn calculate_landing(
    dataset: &FunnelDataset,
    quotation_weights: &WeightMapping,
    opportunity_weights: &WeightMapping,
) -> LandingResult {
    LandingPolicy::default().calculate(dataset, quotation_weights, opportunity_weights)
}

// Left fold keeps insertion order. Totals clamp at the Decimal range instead
// of panicking on overflow.
fn sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        calculate_landing, LandingCalculator, LandingPolicy, DEFAULT_OPPORTUNITY_WEIGHT,
        DEFAULT_QUOTATION_WEIGHT,
    };
    use crate::domain::landing::LandingResult;
    use crate::domain::period::PeriodFilter;
    use crate::domain::records::{
        CrmRecords, Opportunity, OpportunityId, Order, OrderId, Quotation, QuotationId,
    };
    use crate::domain::weights::WeightMapping;
    use crate::funnel::FunnelDataset;

    const DATE: &str = "2026-05-12";

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn weight(tenths: i64) -> Decimal {
        Decimal::new(tenths, 1)
    }

    fn order(id: i64, gross: i64, invoiced: i64, remaining: i64) -> Order {
        Order {
            id: OrderId(id),
            gross_total: dec(gross),
            total_invoiced: dec(invoiced),
            still_to_invoice: dec(remaining),
            date: Some(DATE.to_string()),
            ..Order::default()
        }
    }

    fn quotation(id: i64, status: &str, gross: i64) -> Quotation {
        Quotation {
            id: QuotationId(id),
            status: status.to_string(),
            gross_total: dec(gross),
            date: Some(DATE.to_string()),
            ..Quotation::default()
        }
    }

    fn opportunity(id: i64, stage: &str, amount: i64) -> Opportunity {
        Opportunity {
            id: OpportunityId(id),
            stage: stage.to_string(),
            amount: dec(amount),
            close_date: Some(DATE.to_string()),
            ..Opportunity::default()
        }
    }

    fn dataset(
        orders: Vec<Order>,
        quotations: Vec<Quotation>,
        opportunities: Vec<Opportunity>,
    ) -> FunnelDataset {
        let records = CrmRecords { orders, quotations, opportunities };
        FunnelDataset::build(PeriodFilter::year(2026), records)
    }

    fn mapping(entries: &[(&str, i64)]) -> WeightMapping {
        entries.iter().map(|(code, tenths)| (*code, weight(*tenths))).collect()
    }

    fn assert_landing_identity(result: &LandingResult) {
        assert_eq!(
            result.landing_total,
            result.orders_total
                + result.quotations_weighted_total
                + result.opportunities_weighted_total
        );
    }

    #[test]
    fn default_weights_are_half_and_three_tenths() {
        assert_eq!(DEFAULT_QUOTATION_WEIGHT, weight(5));
        assert_eq!(DEFAULT_OPPORTUNITY_WEIGHT, weight(3));
    }

    #[test]
    fn unlinked_records_use_configured_weights() {
        let data = dataset(
            vec![order(1, 10_000, 5_000, 5_000)],
            vec![quotation(1, "2", 20_000)],
            vec![opportunity(1, "3", 50_000)],
        );

        let result = calculate_landing(&data, &mapping(&[("2", 7)]), &mapping(&[("3", 3)]));

        assert_eq!(result.orders_total, dec(10_000));
        assert_eq!(result.orders_invoiced, dec(5_000));
        assert_eq!(result.orders_remaining, dec(5_000));
        assert_eq!(result.quotations_weighted_total, dec(14_000));
        assert_eq!(result.opportunities_weighted_total, dec(15_000));
        assert_eq!(result.landing_total, dec(39_000));
        assert_eq!(
            (result.order_count, result.quotation_count, result.opportunity_count),
            (1, 1, 1)
        );
    }

    #[test]
    fn empty_mappings_fall_back_to_default_weights() {
        let data = dataset(
            vec![order(1, 10_000, 5_000, 5_000)],
            vec![quotation(1, "2", 20_000)],
            vec![opportunity(1, "3", 50_000)],
        );

        let result = calculate_landing(&data, &WeightMapping::new(), &WeightMapping::new());

        assert_eq!(result.quotations_weighted_total, dec(10_000));
        assert_eq!(result.opportunities_weighted_total, dec(15_000));
        assert_eq!(result.landing_total, dec(35_000));
        assert_landing_identity(&result);
    }

    #[test]
    fn quotation_converted_to_order_is_not_weighted() {
        let mut converted = order(1, 30_000, 0, 30_000);
        converted.quotation_id = Some(QuotationId(1));
        let data = dataset(
            vec![converted],
            vec![quotation(1, "2", 30_000), quotation(2, "2", 15_000)],
            vec![],
        );

        let result = calculate_landing(&data, &mapping(&[("2", 8)]), &WeightMapping::new());

        assert_eq!(result.quotation_count, 1);
        assert_eq!(result.quotations_raw_total, dec(15_000));
        assert_eq!(result.quotations_weighted_total, dec(12_000));
    }

    #[test]
    fn opportunity_linked_to_order_is_not_weighted() {
        let mut linked = order(1, 10_000, 0, 10_000);
        linked.opportunity_id = Some(OpportunityId(5));
        let data = dataset(
            vec![linked],
            vec![],
            vec![opportunity(5, "3", 80_000), opportunity(10, "3", 40_000)],
        );

        let result = calculate_landing(&data, &WeightMapping::new(), &mapping(&[("3", 5)]));

        assert_eq!(result.opportunity_count, 1);
        assert_eq!(result.opportunities_raw_total, dec(40_000));
        assert_eq!(result.opportunities_weighted_total, dec(20_000));
        assert_eq!(result.landing_total, dec(30_000));
    }

    #[test]
    fn multiple_records_sum_per_category() {
        let data = dataset(
            vec![order(1, 10_000, 3_000, 7_000), order(2, 25_000, 25_000, 0)],
            vec![quotation(1, "1", 15_000), quotation(2, "2", 30_000)],
            vec![opportunity(1, "1", 20_000), opportunity(2, "2", 60_000)],
        );

        let result = calculate_landing(
            &data,
            &mapping(&[("1", 9), ("2", 6)]),
            &mapping(&[("1", 2), ("2", 5)]),
        );

        assert_eq!(result.orders_total, dec(35_000));
        assert_eq!(result.orders_invoiced, dec(28_000));
        assert_eq!(result.orders_remaining, dec(7_000));
        assert_eq!(result.quotations_raw_total, dec(45_000));
        assert_eq!(result.quotations_weighted_total, dec(31_500));
        assert_eq!(result.opportunities_raw_total, dec(80_000));
        assert_eq!(result.opportunities_weighted_total, dec(34_000));
        assert_eq!(result.landing_total, dec(100_500));
    }

    #[test]
    fn empty_dataset_yields_zero_result() {
        let result = calculate_landing(
            &dataset(vec![], vec![], vec![]),
            &mapping(&[("2", 7)]),
            &WeightMapping::new(),
        );
        assert_eq!(result, LandingResult::default());
    }

    #[test]
    fn custom_policy_replaces_fallbacks_only_for_unmapped_codes() {
        let policy = LandingPolicy {
            default_quotation_weight: Decimal::ONE,
            default_opportunity_weight: Decimal::ZERO,
        };
        let data = dataset(
            vec![],
            vec![quotation(1, "2", 1_000), quotation(2, "9", 1_000)],
            vec![opportunity(1, "3", 1_000)],
        );

        let result = policy.calculate(&data, &mapping(&[("9", 0)]), &WeightMapping::new());

        assert_eq!(result.quotations_weighted_total, dec(1_000));
        assert_eq!(result.opportunities_weighted_total, Decimal::ZERO);
        assert_landing_identity(&result);
    }

    #[test]
    fn amounts_beyond_decimal_range_clamp_instead_of_panicking() {
        let mut first = order(1, 0, 0, 0);
        first.gross_total = Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0);
        let mut second = order(2, 0, 0, 0);
        second.gross_total = first.gross_total;
        let mut huge = quotation(1, "2", 0);
        huge.gross_total = Decimal::MAX;
        let data = dataset(vec![first, second], vec![huge], vec![]);

        let result = calculate_landing(&data, &mapping(&[("2", 10)]), &WeightMapping::new());

        assert_eq!(result.orders_total, Decimal::MAX);
        assert_eq!(result.quotations_weighted_total, Decimal::MAX);
        assert_eq!(result.landing_total, Decimal::MAX);
    }

    #[test]
    fn fractional_amounts_keep_exact_identity() {
        let mut first = quotation(1, "2", 0);
        first.gross_total = Decimal::new(1_234_567, 2);
        let mut second = opportunity(1, "4", 0);
        second.amount = Decimal::new(9_999_99, 2);
        let data = dataset(vec![order(1, 333, 111, 222)], vec![first], vec![second]);

        let result = calculate_landing(&data, &mapping(&[("2", 7)]), &mapping(&[("4", 1)]));

        assert_eq!(result.quotations_weighted_total, Decimal::new(864_196_9, 3));
        assert_eq!(result.opportunities_weighted_total, Decimal::new(999_999, 3));
        assert_landing_identity(&result);
    }
}
