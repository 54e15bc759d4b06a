//! CRM collaborator
//!
//! The external CRM owns contact lifecycle entirely; the gateway only
//! mutates contacts matched by email and never creates or deletes them.
//! `CrmApi` is the seam, `CrmClient` the REST implementation, `sync` the
//! best-effort mirroring logic, and `encoding` the ordered payload-shape
//! strategies that absorb the CRM's custom-field schema drift.

pub mod client;
pub mod encoding;
pub mod sync;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::Result;

pub use client::CrmClient;
pub use encoding::FieldEncoding;
pub use sync::{CrmSync, CrmSyncConfig};

/// A CRM contact as returned by the lookup endpoint
#[derive(Debug, Clone)]
pub struct CrmContact {
    pub id: String,
    /// Raw contact fields; the API is inconsistent about which owner field
    /// it populates, so callers probe a chain of names
    pub fields: serde_json::Map<String, Value>,
}

impl CrmContact {
    /// Read a field as a non-empty string
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Outcome of a contact update call
///
/// Transport failures are `Err`; an HTTP response is always `Ok` so the
/// sync loop can distinguish "key format rejected" from "rate limited".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 2xx
    Accepted,
    /// 429 — retryable once with backoff
    RateLimited,
    /// Any other non-2xx status
    Rejected(u16),
}

/// The CRM operations the gateway depends on
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Look up a contact by email; `None` when no contact matches
    async fn lookup_contact(&self, email: &str) -> Result<Option<CrmContact>>;

    /// PUT a partial update body to a contact
    async fn update_contact(&self, contact_id: &str, body: Value) -> Result<UpdateOutcome>;
}
