//! Prospect Reconciler — email to `(legacy_code, record_id)`, idempotently
//!
//! Find-or-create a Prospect row keyed by email and guarantee it carries a
//! legacy code. The code is derived once from the store-assigned auto
//! number and never regenerated: a record that already has a non-empty code
//! keeps it, whatever this instance's prefix/offset configuration says.
//!
//! Per invocation: at most one create, at most one code-assignment patch,
//! at most one corrective re-fetch (the store sometimes omits the auto
//! number from the create response).
//!
//! Concurrent first-time submissions for the same email can both miss the
//! lookup and both create a row. The store offers no conditional-create
//! primitive, so the race stands; see DESIGN.md.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Args;
use crate::types::{GatewayError, Result};

use super::{RecordStore, StoreRecord};

/// Outcome of reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub legacy_code: String,
    pub record_id: String,
}

impl Resolution {
    /// Placeholder pair used by the degrade-on-store-error policy: the
    /// submission proceeds, the code is visibly not a real one.
    pub fn sentinel() -> Self {
        Self {
            legacy_code: "PENDING".to_string(),
            record_id: String::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.record_id.is_empty()
    }
}

/// Turns an email address into a durable `(legacy_code, record_id)` pair
pub struct ProspectReconciler {
    store: Arc<dyn RecordStore>,
    email_field: String,
    code_field: String,
    autonum_field: String,
    code_prefix: String,
    code_base_offset: i64,
}

impl ProspectReconciler {
    pub fn new(store: Arc<dyn RecordStore>, args: &Args) -> Self {
        Self {
            store,
            email_field: args.email_field.clone(),
            code_field: args.code_field.clone(),
            autonum_field: args.autonum_field.clone(),
            code_prefix: args.code_prefix.clone(),
            code_base_offset: args.code_base_offset,
        }
    }

    /// Derive a legacy code from a store auto number. Pure and
    /// deterministic; the store round-trip is the only nondeterminism in
    /// this module.
    fn derive_code(&self, auto_number: i64) -> String {
        format!("{}{}", self.code_prefix, self.code_base_offset + auto_number)
    }

    /// Read the auto number from a record, re-fetching once when the
    /// in-hand copy omits it
    async fn auto_number(&self, record: &StoreRecord) -> Result<i64> {
        if let Some(auto) = record.int_field(&self.autonum_field) {
            return Ok(auto);
        }

        debug!(record_id = %record.id, "Auto number missing, re-fetching record");
        let fresh = self.store.fetch(&record.id).await?;
        fresh.int_field(&self.autonum_field).ok_or_else(|| {
            GatewayError::Store(format!(
                "record {} has no {} after re-fetch",
                record.id, self.autonum_field
            ))
        })
    }

    /// Assign a freshly derived code to a record and return it
    async fn assign_code(&self, record: &StoreRecord) -> Result<String> {
        let auto = self.auto_number(record).await?;
        let code = self.derive_code(auto);
        self.store
            .patch(&record.id, json!({ &self.code_field: code.clone() }))
            .await?;
        info!(record_id = %record.id, legacy_code = %code, "Legacy code assigned");
        Ok(code)
    }

    /// Find or create the Prospect row for `email` and return its stable
    /// identifier pair.
    ///
    /// Calling this twice in sequence returns the same pair both times and
    /// issues no second create.
    pub async fn resolve(&self, email: &str) -> Result<Resolution> {
        let email = email.trim();
        if email.is_empty() {
            return Err(GatewayError::Validation("Missing email".to_string()));
        }

        // Exact-match lookup; no case folding, matching the store formula
        if let Some(record) = self
            .store
            .find_first_by_field(&self.email_field, email)
            .await?
        {
            // Existing code wins unconditionally
            if let Some(code) = record.text_field(&self.code_field) {
                debug!(record_id = %record.id, legacy_code = %code, "Prospect found with code");
                return Ok(Resolution {
                    legacy_code: code.to_string(),
                    record_id: record.id.clone(),
                });
            }

            let code = self.assign_code(&record).await?;
            return Ok(Resolution {
                legacy_code: code,
                record_id: record.id,
            });
        }

        // No match: create, then derive the code from the assigned auto number
        let record = self
            .store
            .create(json!({ &self.email_field: email }))
            .await?;
        info!(record_id = %record.id, "Prospect created");

        let code = self.assign_code(&record).await?;
        Ok(Resolution {
            legacy_code: code,
            record_id: record.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MockRecordStore;
    use clap::Parser;
    use std::sync::atomic::Ordering;

    fn reconciler_with_mock() -> (ProspectReconciler, Arc<MockRecordStore>) {
        let args = Args::parse_from(["deepdive-gateway"]);
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let reconciler = ProspectReconciler::new(store.clone(), &args);
        (reconciler, store)
    }

    #[tokio::test]
    async fn test_resolve_creates_new_prospect() {
        let (reconciler, store) = reconciler_with_mock();

        let resolution = reconciler.resolve("a@x.com").await.unwrap();
        assert_eq!(resolution.legacy_code, "Legacy-X25-OP1001");
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);

        let record = store.record(&resolution.record_id).unwrap();
        assert_eq!(record.text_field("Legacy Code"), Some("Legacy-X25-OP1001"));
        assert_eq!(record.text_field("Prospect Email"), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (reconciler, store) = reconciler_with_mock();

        let first = reconciler.resolve("a@x.com").await.unwrap();
        let second = reconciler.resolve("a@x.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.record_count(), 1);
        // No second create, no second code patch
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.patch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_code_never_regenerated() {
        let (reconciler, store) = reconciler_with_mock();

        let mut fields = serde_json::Map::new();
        fields.insert("Prospect Email".into(), "b@x.com".into());
        fields.insert("Legacy Code".into(), "Legacy-X25-OP9999".into());
        fields.insert("AutoNum".into(), 42.into());
        store.seed(crate::store::StoreRecord {
            id: "recSEED".into(),
            fields,
        });

        let resolution = reconciler.resolve("b@x.com").await.unwrap();
        assert_eq!(resolution.legacy_code, "Legacy-X25-OP9999");
        assert_eq!(resolution.record_id, "recSEED");
        assert_eq!(store.patch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_code_assigned_on_existing_record() {
        let (reconciler, store) = reconciler_with_mock();

        let mut fields = serde_json::Map::new();
        fields.insert("Prospect Email".into(), "c@x.com".into());
        fields.insert("AutoNum".into(), 7.into());
        store.seed(crate::store::StoreRecord {
            id: "recOLD".into(),
            fields,
        });

        let resolution = reconciler.resolve("c@x.com").await.unwrap();
        assert_eq!(resolution.legacy_code, "Legacy-X25-OP1007");
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.patch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_when_create_omits_auto_number() {
        let (reconciler, store) = reconciler_with_mock();
        store.omit_autonum_on_create.store(true, Ordering::SeqCst);

        let resolution = reconciler.resolve("d@x.com").await.unwrap();
        assert_eq!(resolution.legacy_code, "Legacy-X25-OP1001");
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_email_is_validation_error() {
        let (reconciler, store) = reconciler_with_mock();

        let err = reconciler.resolve("   ").await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_outage_propagates_store_error() {
        let (reconciler, store) = reconciler_with_mock();
        store.fail_all.store(true, Ordering::SeqCst);

        let err = reconciler.resolve("e@x.com").await.unwrap_err();
        assert!(matches!(err, GatewayError::Store(_)));
    }

    #[test]
    fn test_sentinel_resolution() {
        let sentinel = Resolution::sentinel();
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.legacy_code, "PENDING");
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        // Exact-match semantics: A@X.COM and a@x.com are distinct keys.
        // Documented limitation, not a matching guarantee.
        let (reconciler, store) = reconciler_with_mock();
        reconciler.resolve("a@x.com").await.unwrap();
        reconciler.resolve("A@X.COM").await.unwrap();
        assert_eq!(store.record_count(), 2);
    }
}
