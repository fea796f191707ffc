use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{HuntPlan, LoadCandidate, VehicleTypeMapping};
use crate::services::retry::{with_retry, RetryPolicy};

/// Errors that can occur when querying the brokerage data API
#[derive(Debug, Error)]
pub enum BrokerApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Logical resource names on the data API
#[derive(Debug, Clone)]
pub struct BrokerTables {
    pub hunt_plans: String,
    pub load_candidates: String,
    pub vehicle_type_mappings: String,
}

impl Default for BrokerTables {
    fn default() -> Self {
        Self {
            hunt_plans: "hunt_plans".to_string(),
            load_candidates: "load_candidates".to_string(),
            vehicle_type_mappings: "vehicle_type_mappings".to_string(),
        }
    }
}

/// Read-only client for the hosted data API.
///
/// Fetches the three inputs the matcher needs:
/// - hunt plans (enabled, non-deleted, per tenant)
/// - load candidates (recent first, bounded)
/// - vehicle-type mapping rows
///
/// Every read retries with bounded exponential backoff, and every parsed row
/// is checked against the requested tenant as a defense-in-depth filter even
/// though the query already scopes by tenant.
pub struct BrokerApiClient {
    base_url: String,
    api_key: String,
    client: Client,
    tables: BrokerTables,
    retry: RetryPolicy,
}

impl BrokerApiClient {
    pub fn new(
        base_url: String,
        api_key: String,
        tables: BrokerTables,
        retry: RetryPolicy,
    ) -> Result<Self, BrokerApiError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
            tables,
            retry,
        })
    }

    /// Enabled, non-deleted hunt plans for a tenant.
    pub async fn get_hunt_plans(&self, tenant_id: Uuid) -> Result<Vec<HuntPlan>, BrokerApiError> {
        let filters = [
            ("tenant_id", format!("eq.{}", tenant_id)),
            ("enabled", "eq.true".to_string()),
            ("status", "eq.active".to_string()),
        ];
        let rows = self.get_rows(&self.tables.hunt_plans, &filters).await?;
        Ok(self.parse_rows::<HuntPlan>(rows, tenant_id, |p| p.tenant_id, "hunt plan"))
    }

    /// Recent load candidates for a tenant, newest first.
    pub async fn get_load_candidates(
        &self,
        tenant_id: Uuid,
        received_after: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LoadCandidate>, BrokerApiError> {
        let filters = [
            ("tenant_id", format!("eq.{}", tenant_id)),
            ("received_at", format!("gte.{}", received_after.to_rfc3339())),
            ("order", "received_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        let rows = self.get_rows(&self.tables.load_candidates, &filters).await?;
        Ok(self.parse_rows::<LoadCandidate>(rows, tenant_id, |l| l.tenant_id, "load candidate"))
    }

    /// A tenant's vehicle-type vocabulary rows. May legitimately be empty;
    /// the canonicalizer falls back to its built-in vocabulary.
    pub async fn get_vehicle_type_mappings(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<VehicleTypeMapping>, BrokerApiError> {
        let filters = [("tenant_id", format!("eq.{}", tenant_id))];
        let rows = self
            .get_rows(&self.tables.vehicle_type_mappings, &filters)
            .await?;
        Ok(self.parse_rows::<VehicleTypeMapping>(rows, tenant_id, |m| m.tenant_id, "vehicle-type mapping"))
    }

    /// Fetch all three matcher inputs concurrently and await them together,
    /// so the matcher never runs against partially loaded state.
    pub async fn fetch_matching_inputs(
        &self,
        tenant_id: Uuid,
        received_after: DateTime<Utc>,
        load_limit: usize,
    ) -> Result<(Vec<HuntPlan>, Vec<LoadCandidate>, Vec<VehicleTypeMapping>), BrokerApiError> {
        let (plans, loads, mappings) = tokio::join!(
            self.get_hunt_plans(tenant_id),
            self.get_load_candidates(tenant_id, received_after, load_limit),
            self.get_vehicle_type_mappings(tenant_id),
        );
        Ok((plans?, loads?, mappings?))
    }

    async fn get_rows(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, BrokerApiError> {
        let query = filters
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!(
            "{}/rest/v1/{}?{}",
            self.base_url.trim_end_matches('/'),
            table,
            query
        );

        tracing::debug!("Querying data API: {}", url);

        let what = format!("query {}", table);
        with_retry(&self.retry, &what, || async {
            let response = self
                .client
                .get(&url)
                .header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(BrokerApiError::ApiError(format!(
                    "Failed to query {}: {}",
                    table,
                    response.status()
                )));
            }

            let json: Value = response.json().await?;
            json.as_array().cloned().ok_or_else(|| {
                BrokerApiError::InvalidResponse(format!("{} response is not an array", table))
            })
        })
        .await
    }

    /// Deserialize rows, dropping unparsable ones and any row whose tenant
    /// differs from the requested tenant.
    fn parse_rows<T>(
        &self,
        rows: Vec<Value>,
        tenant_id: Uuid,
        row_tenant: impl Fn(&T) -> Uuid,
        what: &str,
    ) -> Vec<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let total = rows.len();
        let parsed: Vec<T> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<T>(row) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Skipping unparsable {} row: {}", what, e);
                    None
                }
            })
            .filter(|value| {
                let row_tenant_id = row_tenant(value);
                if row_tenant_id != tenant_id {
                    tracing::warn!(
                        expected = %tenant_id,
                        got = %row_tenant_id,
                        "Dropping {} row from another tenant",
                        what
                    );
                    return false;
                }
                true
            })
            .collect();

        tracing::debug!("Parsed {}/{} {} rows", parsed.len(), total, what);
        parsed
    }
}
