//! REST client for the CRM
//!
//! Lookup by email + location, partial contact updates via PUT. The lookup
//! response shape varies between `{contacts: [...]}` and `{contact: {...}}`
//! depending on API revision; both are accepted.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Args;
use crate::types::{GatewayError, Result};

use super::{CrmApi, CrmContact, UpdateOutcome};

/// REST client bound to one CRM location
pub struct CrmClient {
    http: reqwest::Client,
    api_key: String,
    location_id: String,
    base_url: String,
}

impl CrmClient {
    /// Build a client from configuration. Returns None when CRM
    /// credentials are absent (sync degrades to a no-op).
    pub fn from_args(args: &Args) -> Option<Self> {
        let api_key = args.crm_api_key.clone()?;
        let location_id = args.crm_location_id.clone()?;
        Some(Self::new(
            &args.crm_base_url,
            api_key,
            location_id,
            args.http_timeout(),
        ))
    }

    pub fn new(base_url: &str, api_key: String, location_id: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_key,
            location_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn map_transport(err: reqwest::Error) -> GatewayError {
        GatewayError::Sync(format!("CRM transport error: {}", err))
    }

    /// Pull the first contact out of either lookup response shape
    fn parse_lookup(body: Value) -> Option<CrmContact> {
        let raw = if let Some(contacts) = body.get("contacts").and_then(Value::as_array) {
            contacts.first().cloned()?
        } else {
            body.get("contact").cloned()?
        };

        let fields = raw.as_object()?.clone();
        let id = fields.get("id").and_then(Value::as_str)?.to_string();
        Some(CrmContact { id, fields })
    }
}

#[async_trait]
impl CrmApi for CrmClient {
    async fn lookup_contact(&self, email: &str) -> Result<Option<CrmContact>> {
        let response = self
            .http
            .get(format!("{}/contacts/lookup", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("email", email), ("locationId", self.location_id.as_str())])
            .send()
            .await
            .map_err(Self::map_transport)?;

        // A 404 from lookup means "no matching contact", not a failure
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Sync(format!(
                "CRM lookup returned {}: {}",
                status, body
            )));
        }

        let body: Value = response.json().await.map_err(Self::map_transport)?;
        let contact = Self::parse_lookup(body);
        debug!(email = %email, found = contact.is_some(), "CRM contact lookup");
        Ok(contact)
    }

    async fn update_contact(&self, contact_id: &str, body: Value) -> Result<UpdateOutcome> {
        let response = self
            .http
            .put(format!("{}/contacts/{}", self.base_url, contact_id))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(UpdateOutcome::Accepted)
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(UpdateOutcome::RateLimited)
        } else {
            Ok(UpdateOutcome::Rejected(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_lookup_plural_shape() {
        let body = json!({
            "contacts": [{"id": "c1", "email": "a@x.com", "assignedUserId": "u9"}]
        });
        let contact = CrmClient::parse_lookup(body).unwrap();
        assert_eq!(contact.id, "c1");
        assert_eq!(contact.text_field("assignedUserId"), Some("u9"));
    }

    #[test]
    fn test_parse_lookup_singular_shape() {
        let body = json!({"contact": {"id": "c2", "email": "b@x.com"}});
        let contact = CrmClient::parse_lookup(body).unwrap();
        assert_eq!(contact.id, "c2");
    }

    #[test]
    fn test_parse_lookup_no_match() {
        assert!(CrmClient::parse_lookup(json!({"contacts": []})).is_none());
        assert!(CrmClient::parse_lookup(json!({})).is_none());
        // Contact without an id is unusable
        assert!(CrmClient::parse_lookup(json!({"contact": {"email": "x"}})).is_none());
    }
}
