pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod funnel;
pub mod ports;
pub mod service;

pub use cache::TtlCache;
pub use domain::labels::StatusLabels;
pub use domain::landing::{
    CodeLabel, DiscoveredCodes, FunnelSnapshot, LandingResult, LandingView, SimulationOutcome,
};
pub use domain::period::{PeriodFilter, Quarter};
pub use domain::records::{
    CrmRecords, Customer, CustomerId, Opportunity, OpportunityId, Order, OrderId, Project,
    ProjectId, Quotation, QuotationId,
};
pub use domain::scenario::{NewScenario, ScenarioId, SimulationScenario};
pub use domain::weights::{validate_weight, WeightEntry, WeightKind, WeightMapping};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use funnel::{
    calculate_landing, deduplicate, discover_codes, FunnelDataset, LandingCalculator,
    LandingPolicy, DEFAULT_OPPORTUNITY_WEIGHT, DEFAULT_QUOTATION_WEIGHT,
};
pub use ports::{
    CacheError, CachedSnapshot, CrmDataSource, DataType, ScenarioStore, SnapshotCache,
    SourceError, StoreError, WeightStore,
};
pub use service::{LandingService, ScenarioService};
