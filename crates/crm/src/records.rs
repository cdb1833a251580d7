//! Wire records to domain records. Numeric fields arrive as numbers or
//! strings, ids of zero mean "no link" and empty dates mean "no date".

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use funnel_core::{
    Customer, CustomerId, Opportunity, OpportunityId, Order, OrderId, Project, ProjectId,
    Quotation, QuotationId, SourceError, StatusLabels,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

type Record = Map<String, Value>;

/// Customer and project lookups used to enrich transactional records.
#[derive(Clone, Debug, Default)]
pub struct ReferenceData {
    pub customers: Arc<HashMap<CustomerId, Customer>>,
    pub projects: Arc<HashMap<ProjectId, Project>>,
}

impl ReferenceData {
    fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }
}

pub fn as_record<'a>(endpoint: &str, value: &'a Value) -> Result<&'a Record, SourceError> {
    value.as_object().ok_or_else(|| SourceError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("expected a JSON object, got `{value}`"),
    })
}

pub fn customer_from(record: &Record) -> Customer {
    let name1 = text(record, "name1");
    let label = first_text(record, &["label", "name1"]);
    Customer {
        id: CustomerId(int(record, "customerid")),
        label,
        name1,
        name2: text(record, "name2"),
        account_number: text(record, "account_number"),
    }
}

pub fn project_from(record: &Record) -> Project {
    Project {
        id: ProjectId(int(record, "projectid")),
        label: text(record, "label"),
        customer_id: link(record, "customerid").map(CustomerId),
    }
}

pub fn quotation_from(record: &Record, refs: &ReferenceData, labels: &StatusLabels) -> Quotation {
    let customer_id = CustomerId(int(record, "customerid"));
    let customer = refs.customer(customer_id);
    let status = code(record, "status");
    Quotation {
        id: QuotationId(int(record, "quotationid")),
        uid: text(record, "uid"),
        label: first_text(record, &["label", "reference"]),
        reference: text(record, "reference"),
        customer_id,
        customer_name: customer.map(|c| c.label.clone()).unwrap_or_default(),
        account_number: customer.map(|c| c.account_number.clone()).unwrap_or_default(),
        project_id: link(record, "projectid").map(ProjectId),
        opportunity_id: link(record, "opid").map(OpportunityId),
        status_label: labels.quotation_status(&status),
        status,
        gross_total: decimal(record, "gross_total"),
        grand_total: decimal(record, "grand_total"),
        date: date(record, "date"),
        signature_date: date(record, "signature_date"),
        period_start: date(record, "period_start"),
        period_end: date(record, "period_end"),
        employee_id: link(record, "employeeid"),
        assign_to_name: optional_text(record, "assign_to_name"),
    }
}

pub fn order_from(record: &Record, refs: &ReferenceData, labels: &StatusLabels) -> Order {
    let customer_id = CustomerId(int(record, "customerid"));
    let customer = refs.customer(customer_id);
    let project_id = link(record, "projectid").map(ProjectId);
    let project_label = project_id
        .and_then(|id| refs.projects.get(&id))
        .map(|project| project.label.clone())
        .unwrap_or_default();
    let status = code(record, "status");
    Order {
        id: OrderId(int(record, "orderid")),
        uid: text(record, "uid"),
        label: first_text(record, &["label", "reference"]),
        reference: text(record, "reference"),
        customer_id,
        customer_name: customer.map(|c| c.label.clone()).unwrap_or_default(),
        account_number: customer.map(|c| c.account_number.clone()).unwrap_or_default(),
        project_id,
        project_label,
        quotation_id: link(record, "quotationid").map(QuotationId),
        opportunity_id: link(record, "opid").map(OpportunityId),
        status_label: labels.order_status(&status),
        status,
        gross_total: decimal(record, "gross_total"),
        grand_total: decimal(record, "grand_total"),
        total_invoiced: decimal(record, "total_invoiced"),
        still_to_invoice: decimal(record, "still_to_invoice"),
        date: date(record, "date"),
        signature_date: date(record, "signature_date"),
        period_start: date(record, "period_start"),
        period_end: date(record, "period_end"),
        assign_to_name: optional_text(record, "assign_to_name"),
    }
}

pub fn opportunity_from(
    record: &Record,
    refs: &ReferenceData,
    labels: &StatusLabels,
) -> Opportunity {
    let customer_id = CustomerId(int(record, "customerid"));
    let kind = code(record, "type");
    let stage = code(record, "stage");
    Opportunity {
        id: OpportunityId(int(record, "opid")),
        label: text(record, "label"),
        kind_label: labels.opportunity_type(&kind),
        kind,
        stage_label: labels.opportunity_stage(&stage),
        stage,
        customer_id,
        customer_name: refs.customer(customer_id).map(|c| c.label.clone()).unwrap_or_default(),
        amount: decimal(record, "amount"),
        probability: optional_decimal(record, "probability"),
        close_date: date(record, "close_date"),
        quantity: optional_decimal(record, "quantity"),
        price: optional_decimal(record, "price"),
        cost: optional_decimal(record, "cost"),
        margin: optional_decimal(record, "margin"),
        assign_to_name: optional_text(record, "assign_to_name"),
        period_start: date(record, "period_start"),
        period_end: date(record, "period_end"),
    }
}

fn text(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn optional_text(record: &Record, field: &str) -> Option<String> {
    Some(text(record, field)).filter(|value| !value.is_empty())
}

fn first_text(record: &Record, fields: &[&str]) -> String {
    fields.iter().find_map(|field| optional_text(record, field)).unwrap_or_default()
}

fn date(record: &Record, field: &str) -> Option<String> {
    optional_text(record, field).filter(|value| !value.trim().is_empty())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw).ok().or_else(|| Decimal::from_scientific(raw).ok())
}

fn number(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text),
        _ => None,
    }
}

fn decimal(record: &Record, field: &str) -> Decimal {
    record.get(field).and_then(number).unwrap_or(Decimal::ZERO)
}

// Absent or null stays unknown; anything else coerces like a required amount.
fn optional_decimal(record: &Record, field: &str) -> Option<Decimal> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(number(value).unwrap_or(Decimal::ZERO)),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|n| n.trunc() as i64))
        }
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| text.parse::<f64>().ok().map(|n| n.trunc() as i64))
        }
        _ => None,
    }
}

fn int(record: &Record, field: &str) -> i64 {
    record.get(field).and_then(integer).unwrap_or(0)
}

fn link(record: &Record, field: &str) -> Option<i64> {
    Some(int(record, field)).filter(|id| *id != 0)
}

fn code(record: &Record, field: &str) -> String {
    int(record, field).to_string()
}
