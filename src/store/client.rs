//! REST client for the record store
//!
//! Airtable-shaped API: filter-formula lookups returning `{records: [...]}`,
//! `POST {fields}` to create, `PATCH /{id}` with partial fields. All calls
//! are synchronous blocking HTTP from the request's point of view, with one
//! fixed short timeout and no circuit breaker.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::Args;
use crate::types::{GatewayError, Result};

use super::{RecordStore, StoreRecord};

/// Wire shape of a list/lookup response
#[derive(Debug, Deserialize)]
struct RecordsEnvelope {
    #[serde(default)]
    records: Vec<WireRecord>,
}

/// Wire shape of a single record
#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

impl From<WireRecord> for StoreRecord {
    fn from(wire: WireRecord) -> Self {
        StoreRecord {
            id: wire.id,
            fields: wire.fields,
        }
    }
}

/// REST client bound to one base + table
pub struct RecordStoreClient {
    http: reqwest::Client,
    api_key: String,
    table_url: String,
}

impl RecordStoreClient {
    /// Build a client from configuration. Returns None when the store
    /// credentials are absent (the gateway degrades to sentinel codes).
    pub fn from_args(args: &Args) -> Option<Self> {
        let api_key = args.store_api_key.clone()?;
        let base_id = args.store_base_id.clone()?;
        Some(Self::new(
            &args.store_base_url,
            &base_id,
            &args.prospects_table,
            api_key,
            args.http_timeout(),
        ))
    }

    pub fn new(
        base_url: &str,
        base_id: &str,
        table: &str,
        api_key: String,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let table_url = format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            base_id,
            urlencoding::encode(table)
        );

        Self {
            http,
            api_key,
            table_url,
        }
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.table_url, record_id)
    }

    fn map_transport(err: reqwest::Error) -> GatewayError {
        GatewayError::Store(format!("record store transport error: {}", err))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Store(format!(
                "record store returned {}: {}",
                status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl RecordStore for RecordStoreClient {
    async fn find_first_by_field(&self, field: &str, value: &str) -> Result<Option<StoreRecord>> {
        // Exact-match formula, case-sensitive. Matches the historical
        // behavior: no normalization beyond what the caller already did.
        let formula = format!("{{{}}} = '{}'", field, value);
        debug!(formula = %formula, "Record store lookup");

        let response = self
            .http
            .get(&self.table_url)
            .bearer_auth(&self.api_key)
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .send()
            .await
            .map_err(Self::map_transport)?;

        let response = Self::check_status(response).await?;
        let envelope: RecordsEnvelope = response.json().await.map_err(Self::map_transport)?;
        Ok(envelope.records.into_iter().next().map(StoreRecord::from))
    }

    async fn create(&self, fields: Value) -> Result<StoreRecord> {
        let response = self
            .http
            .post(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(Self::map_transport)?;

        let response = Self::check_status(response).await?;
        let wire: WireRecord = response.json().await.map_err(Self::map_transport)?;
        debug!(record_id = %wire.id, "Record created");
        Ok(wire.into())
    }

    async fn patch(&self, record_id: &str, fields: Value) -> Result<()> {
        let response = self
            .http
            .patch(self.record_url(record_id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(Self::map_transport)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch(&self, record_id: &str) -> Result<StoreRecord> {
        let response = self
            .http
            .get(self.record_url(record_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let response = Self::check_status(response).await?;
        let wire: WireRecord = response.json().await.map_err(Self::map_transport)?;
        Ok(wire.into())
    }
}
