use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::core::VehicleTypeTable;
use crate::services::broker_api::{BrokerApiClient, BrokerApiError};

/// Session cache of per-tenant vehicle-type tables.
///
/// The mapping table is administrator-maintained and changes rarely, so it is
/// loaded once per tenant and held for the session TTL instead of being
/// re-fetched on every aggregation pass.
pub struct VehicleTypeCatalog {
    api: Arc<BrokerApiClient>,
    cache: Cache<Uuid, Arc<VehicleTypeTable>>,
}

impl VehicleTypeCatalog {
    pub fn new(api: Arc<BrokerApiClient>, capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { api, cache }
    }

    /// The canonicalization table for a tenant, fetching on first use.
    ///
    /// A tenant with no mapping rows gets the built-in vocabulary; a fetch
    /// failure propagates so the caller can keep its previous state.
    pub async fn table_for(&self, tenant_id: Uuid) -> Result<Arc<VehicleTypeTable>, BrokerApiError> {
        if let Some(table) = self.cache.get(&tenant_id).await {
            tracing::trace!(%tenant_id, "Vehicle-type table cache hit");
            return Ok(table);
        }

        let rows = self.api.get_vehicle_type_mappings(tenant_id).await?;
        if rows.is_empty() {
            tracing::debug!(%tenant_id, "No vehicle-type mappings configured, using built-in vocabulary");
        }

        let table = Arc::new(VehicleTypeTable::from_mappings(&rows));
        self.cache.insert(tenant_id, table.clone()).await;
        Ok(table)
    }

    /// Drop a tenant's cached table, e.g. after an administrator edits the
    /// mapping rows.
    pub async fn invalidate(&self, tenant_id: Uuid) {
        self.cache.invalidate(&tenant_id).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
