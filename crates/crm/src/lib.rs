//! Nicoka CRM data source: paginated HTTP transport, record coercion and
//! customer/project enrichment.

pub mod client;
pub mod records;
pub mod source;

pub use client::{NicokaClient, TransportSettings};
pub use records::ReferenceData;
pub use source::NicokaDataSource;
