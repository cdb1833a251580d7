use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuotationId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpportunityId(pub i64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(CustomerId, ProjectId, OrderId, QuotationId, OpportunityId);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub label: String,
    pub name1: String,
    pub name2: String,
    pub account_number: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub label: String,
    pub customer_id: Option<CustomerId>,
}

/// Realized revenue. Counted at full value and never deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub uid: String,
    pub label: String,
    pub reference: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub account_number: String,
    pub project_id: Option<ProjectId>,
    pub project_label: String,
    pub quotation_id: Option<QuotationId>,
    pub opportunity_id: Option<OpportunityId>,
    pub status: String,
    pub status_label: String,
    pub gross_total: Decimal,
    pub grand_total: Decimal,
    pub total_invoiced: Decimal,
    pub still_to_invoice: Decimal,
    pub date: Option<String>,
    pub signature_date: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub assign_to_name: Option<String>,
}

/// Weighted by status; dropped from totals once an order references it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub uid: String,
    pub label: String,
    pub reference: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub account_number: String,
    pub project_id: Option<ProjectId>,
    pub opportunity_id: Option<OpportunityId>,
    pub status: String,
    pub status_label: String,
    pub gross_total: Decimal,
    pub grand_total: Decimal,
    pub date: Option<String>,
    pub signature_date: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub employee_id: Option<i64>,
    pub assign_to_name: Option<String>,
}

/// Weighted by sales stage; dropped once a quotation or order references it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub label: String,
    pub kind: String,
    pub kind_label: String,
    pub stage: String,
    pub stage_label: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub amount: Decimal,
    pub probability: Option<Decimal>,
    pub close_date: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub assign_to_name: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

/// Raw, enriched record lists for one fetch from the CRM.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmRecords {
    pub orders: Vec<Order>,
    pub quotations: Vec<Quotation>,
    pub opportunities: Vec<Opportunity>,
}
