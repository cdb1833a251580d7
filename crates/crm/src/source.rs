use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use funnel_core::config::CrmConfig;
use funnel_core::{
    CrmDataSource, Customer, CustomerId, Opportunity, Order, Project, ProjectId, Quotation,
    SourceError, StatusLabels, TtlCache,
};
use serde_json::Value;

use crate::client::NicokaClient;
use crate::records::{
    as_record, customer_from, opportunity_from, order_from, project_from, quotation_from,
    ReferenceData,
};

const CUSTOMERS: &str = "/customers";
const PROJECTS: &str = "/projects";
const QUOTATIONS: &str = "/quotations";
const ORDERS: &str = "/orders";
const OPPORTUNITIES: &str = "/opportunities";

/// `CrmDataSource` backed by the Nicoka API. Customers and projects are
/// cached for the reference TTL; transactional lists are always fetched.
pub struct NicokaDataSource {
    client: NicokaClient,
    labels: StatusLabels,
    customers: TtlCache<HashMap<CustomerId, Customer>>,
    projects: TtlCache<HashMap<ProjectId, Project>>,
}

impl NicokaDataSource {
    pub fn new(client: NicokaClient, labels: StatusLabels, reference_ttl: Duration) -> Self {
        Self {
            client,
            labels,
            customers: TtlCache::new(reference_ttl),
            projects: TtlCache::new(reference_ttl),
        }
    }

    pub fn from_config(config: &CrmConfig, labels: StatusLabels) -> Result<Self, SourceError> {
        Ok(Self::new(NicokaClient::from_config(config)?, labels, config.reference_ttl()))
    }

    pub fn client(&self) -> &NicokaClient {
        &self.client
    }

    /// Drops cached customers and projects so the next listing refetches them.
    pub async fn invalidate_references(&self) {
        self.customers.invalidate().await;
        self.projects.invalidate().await;
    }

    async fn customer_index(&self) -> Result<Arc<HashMap<CustomerId, Customer>>, SourceError> {
        self.customers
            .get_or_refresh(|| async {
                let raw = self.client.fetch_all(CUSTOMERS).await?;
                raw.iter()
                    .map(|value| {
                        let customer = customer_from(as_record(CUSTOMERS, value)?);
                        Ok((customer.id, customer))
                    })
                    .collect::<Result<HashMap<_, _>, SourceError>>()
            })
            .await
    }

    async fn project_index(&self) -> Result<Arc<HashMap<ProjectId, Project>>, SourceError> {
        self.projects
            .get_or_refresh(|| async {
                let raw = self.client.fetch_all(PROJECTS).await?;
                raw.iter()
                    .map(|value| {
                        let project = project_from(as_record(PROJECTS, value)?);
                        Ok((project.id, project))
                    })
                    .collect::<Result<HashMap<_, _>, SourceError>>()
            })
            .await
    }

    async fn references(&self, with_projects: bool) -> Result<ReferenceData, SourceError> {
        let customers = self.customer_index().await?;
        let projects =
            if with_projects { self.project_index().await? } else { Arc::new(HashMap::new()) };
        Ok(ReferenceData { customers, projects })
    }

    async fn enriched<T>(
        &self,
        endpoint: &str,
        refs: &ReferenceData,
        convert: impl Fn(&serde_json::Map<String, Value>, &ReferenceData, &StatusLabels) -> T,
    ) -> Result<Vec<T>, SourceError> {
        let raw = self.client.fetch_all(endpoint).await?;
        raw.iter()
            .map(|value| Ok(convert(as_record(endpoint, value)?, refs, &self.labels)))
            .collect()
    }
}

#[async_trait]
impl CrmDataSource for NicokaDataSource {
    async fn list_customers(&self) -> Result<Vec<Customer>, SourceError> {
        let mut customers: Vec<Customer> = self.customer_index().await?.values().cloned().collect();
        customers.sort_by_key(|customer| customer.id);
        Ok(customers)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, SourceError> {
        let mut projects: Vec<Project> = self.project_index().await?.values().cloned().collect();
        projects.sort_by_key(|project| project.id);
        Ok(projects)
    }

    async fn list_quotations(&self) -> Result<Vec<Quotation>, SourceError> {
        let refs = self.references(false).await?;
        self.enriched(QUOTATIONS, &refs, quotation_from).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, SourceError> {
        let refs = self.references(true).await?;
        self.enriched(ORDERS, &refs, order_from).await
    }

    async fn list_opportunities(&self) -> Result<Vec<Opportunity>, SourceError> {
        let refs = self.references(false).await?;
        self.enriched(OPPORTUNITIES, &refs, opportunity_from).await
    }
}
