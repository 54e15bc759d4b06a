//! Record store collaborator
//!
//! The external spreadsheet-style database holding Prospect rows. The
//! gateway only needs four operations: lookup by field, create, patch,
//! and fetch by id. `RecordStore` is the seam; `RecordStoreClient` is the
//! REST implementation; `ProspectReconciler` carries the find-or-create
//! logic on top of it.

pub mod client;
pub mod reconciler;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::Result;

pub use client::RecordStoreClient;
pub use reconciler::{ProspectReconciler, Resolution};

/// One record in the store: opaque id plus a field map
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub id: String,
    pub fields: serde_json::Map<String, Value>,
}

impl StoreRecord {
    /// Read a field as a non-empty string
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Read a field as an integer (the store serializes auto numbers as
    /// plain JSON numbers)
    pub fn int_field(&self, name: &str) -> Option<i64> {
        let value = self.fields.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
    }
}

/// The record-store operations the gateway depends on
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find the first record whose `field` exactly equals `value`
    async fn find_first_by_field(&self, field: &str, value: &str) -> Result<Option<StoreRecord>>;

    /// Create a record with the given fields, returning it as stored
    async fn create(&self, fields: Value) -> Result<StoreRecord>;

    /// Partial-update a record (last-write-wins per field)
    async fn patch(&self, record_id: &str, fields: Value) -> Result<()>;

    /// Fetch a record by id
    async fn fetch(&self, record_id: &str) -> Result<StoreRecord>;
}
