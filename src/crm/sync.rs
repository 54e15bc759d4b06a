//! CRM sync — best-effort answer mirroring with schema-drift fallback
//!
//! Mirrors the normalized answer set into the CRM contact matched by
//! email. Every failure path degrades: no matching contact is a no-op, a
//! rejected field key falls back to the alternate key/shape exactly once,
//! a rate-limited call is retried once after a backoff, and one slot's
//! double failure never touches its neighbors. The function returns the
//! contact's assigned owner (probing an ordered field-name chain) or None;
//! it never returns an error.
//!
//! The per-slot loop is deliberately sequential with a fixed inter-request
//! delay: the CRM's undocumented rate limit answers 429 well below the
//! speed an eager loop would reach.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::schema::QuestionSchema;

use super::encoding::{attempt_plan, FieldAttempt};
use super::{CrmApi, CrmContact, UpdateOutcome};

/// Owner field names probed in order; the API is inconsistent about which
/// one it populates
const OWNER_FIELD_CHAIN: &[&str] = &["assignedUserId", "userId", "assignedTo"];

/// Tuning for the sync loop
#[derive(Debug, Clone)]
pub struct CrmSyncConfig {
    /// Tag appended to the contact on submission
    pub completion_tag: String,
    /// Custom-field key for the legacy code (primary, fallback)
    pub code_key: String,
    pub code_key_fallback: String,
    /// Custom-field key receiving the store record id, best-effort
    pub record_id_key: String,
    /// Pause between per-slot updates
    pub slot_delay: Duration,
    /// Backoff before the single 429 retry
    pub retry_backoff: Duration,
}

impl Default for CrmSyncConfig {
    fn default() -> Self {
        Self {
            completion_tag: "legacy builder deepdive submitted".to_string(),
            code_key: "legacy_code_id".to_string(),
            code_key_fallback: "legacy_code_id_".to_string(),
            record_id_key: "atrid".to_string(),
            slot_delay: Duration::from_millis(350),
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

impl CrmSyncConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            slot_delay: args.crm_slot_delay(),
            retry_backoff: args.crm_retry_backoff(),
            ..Self::default()
        }
    }
}

/// Best-effort mirror of submissions into the CRM contact
pub struct CrmSync {
    client: Option<Arc<dyn CrmApi>>,
    schema: Arc<QuestionSchema>,
    config: CrmSyncConfig,
}

impl CrmSync {
    pub fn new(
        client: Option<Arc<dyn CrmApi>>,
        schema: Arc<QuestionSchema>,
        config: CrmSyncConfig,
    ) -> Self {
        Self {
            client,
            schema,
            config,
        }
    }

    /// Whether CRM sync will do anything at all
    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Resolve the contact's assigned owner from the lookup response
    fn owner_of(contact: &CrmContact) -> Option<String> {
        OWNER_FIELD_CHAIN
            .iter()
            .find_map(|field| contact.text_field(field))
            .map(|s| s.to_string())
    }

    /// Send one update body, retrying a rate-limited call exactly once
    async fn send(&self, client: &dyn CrmApi, contact_id: &str, body: Value) -> UpdateOutcome {
        match client.update_contact(contact_id, body.clone()).await {
            Ok(UpdateOutcome::RateLimited) => {
                debug!(contact_id = %contact_id, "CRM rate limited, backing off once");
                tokio::time::sleep(self.config.retry_backoff).await;
                match client.update_contact(contact_id, body).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(contact_id = %contact_id, error = %e, "CRM update retry failed");
                        UpdateOutcome::Rejected(0)
                    }
                }
            }
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(contact_id = %contact_id, error = %e, "CRM update transport failure");
                UpdateOutcome::Rejected(0)
            }
        }
    }

    /// Write one custom field through its attempt plan. Returns whether
    /// any attempt was accepted; exhaustion logs every attempt taken.
    async fn write_field(
        &self,
        client: &dyn CrmApi,
        contact_id: &str,
        plan: &[FieldAttempt],
        value: &str,
    ) -> bool {
        let mut failures: Vec<String> = Vec::new();

        for attempt in plan {
            let outcome = self.send(client, contact_id, attempt.body(value)).await;
            match outcome {
                UpdateOutcome::Accepted => return true,
                UpdateOutcome::RateLimited => {
                    failures.push(format!("{} [{}]: still rate limited", attempt.key, attempt.encoding.as_str()));
                }
                UpdateOutcome::Rejected(status) => {
                    failures.push(format!("{} [{}]: {}", attempt.key, attempt.encoding.as_str(), status));
                }
            }
        }

        warn!(
            contact_id = %contact_id,
            attempts = %failures.join("; "),
            "CRM field update exhausted all encodings"
        );
        false
    }

    /// Mirror a submission into the CRM contact matched by `email`.
    ///
    /// Returns the contact's assigned owner id, or None when credentials
    /// are unset, no contact matches, or the lookup fails.
    pub async fn sync(
        &self,
        email: &str,
        legacy_code: &str,
        answers: &[String],
        phone: Option<&str>,
        record_id: Option<&str>,
    ) -> Option<String> {
        let client = match &self.client {
            Some(c) => Arc::clone(c),
            None => {
                debug!("CRM credentials not configured, skipping sync");
                return None;
            }
        };

        let contact = match client.lookup_contact(email).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(email = %email, "No CRM contact matches, sync is a no-op");
                return None;
            }
            Err(e) => {
                warn!(email = %email, error = %e, "CRM lookup failed, no owner resolved");
                return None;
            }
        };

        let owner = Self::owner_of(&contact);

        // Completion tag plus primary phone/email in one base update
        let mut base = json!({
            "tags": [self.config.completion_tag],
            "email": email,
        });
        if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
            base["phone"] = Value::from(phone);
        }
        if self.send(client.as_ref(), &contact.id, base).await != UpdateOutcome::Accepted {
            warn!(contact_id = %contact.id, "CRM tag update failed, continuing with fields");
        }

        // Independent per-slot updates with pacing between them
        let mut written = 0usize;
        for slot in self.schema.slots() {
            let value = match answers.get(slot.index) {
                Some(v) => v.as_str(),
                None => continue,
            };

            let plan = attempt_plan(&slot.crm_key, &slot.crm_key_fallback);
            if self
                .write_field(client.as_ref(), &contact.id, &plan, value)
                .await
            {
                written += 1;
            }

            if !self.config.slot_delay.is_zero() {
                tokio::time::sleep(self.config.slot_delay).await;
            }
        }

        // Legacy code goes through the same fallback machinery
        let code_plan = attempt_plan(&self.config.code_key, &self.config.code_key_fallback);
        self.write_field(client.as_ref(), &contact.id, &code_plan, legacy_code)
            .await;

        // Store record id back-reference, best-effort, single shape
        if let Some(record_id) = record_id.filter(|id| !id.is_empty()) {
            let body = json!({ "customField": { &self.config.record_id_key: record_id } });
            if self.send(client.as_ref(), &contact.id, body).await != UpdateOutcome::Accepted {
                debug!(contact_id = %contact.id, "Record id back-reference save failed");
            }
        }

        info!(
            contact_id = %contact.id,
            fields_written = written,
            slot_count = self.schema.slot_count(),
            owner = owner.as_deref().unwrap_or("-"),
            "CRM sync finished"
        );

        owner
    }
}
