//! Answer Propagator — fixed-width answer write into the Prospect row
//!
//! Builds one batched PATCH from the normalized answer set: every slot's
//! store column, the legacy code, the submission timestamp, and the best
//! contact details. Last-write-wins per field, so repeating the call with
//! the same inputs is idempotent.
//!
//! Store failure here is logged and swallowed: answer persistence must not
//! prevent CRM sync or the redirect from proceeding.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::QuestionSchema;
use crate::store::RecordStore;

/// Store column for the submission timestamp
const SUBMITTED_AT_FIELD: &str = "Date Submitted";
/// Store columns for the contact details confirmed during the deep dive
const BEST_EMAIL_FIELD: &str = "Best Email";
const BEST_PHONE_FIELD: &str = "Best Phone";

/// Writes the normalized answer set into the record store
pub struct AnswerPropagator {
    store: Arc<dyn RecordStore>,
    schema: Arc<QuestionSchema>,
    code_field: String,
}

impl AnswerPropagator {
    pub fn new(store: Arc<dyn RecordStore>, schema: Arc<QuestionSchema>, code_field: &str) -> Self {
        Self {
            store,
            schema,
            code_field: code_field.to_string(),
        }
    }

    /// Build the batched field map for one submission
    fn build_fields(
        &self,
        legacy_code: &str,
        answers: &[String],
        email: &str,
        phone: Option<&str>,
    ) -> Map<String, Value> {
        let mut fields = Map::new();

        for slot in self.schema.slots() {
            if let Some(value) = answers.get(slot.index) {
                fields.insert(slot.store_field.clone(), Value::from(value.as_str()));
            }
        }

        fields.insert(self.code_field.clone(), Value::from(legacy_code));
        fields.insert(
            SUBMITTED_AT_FIELD.to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );
        fields.insert(BEST_EMAIL_FIELD.to_string(), Value::from(email));
        if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
            fields.insert(BEST_PHONE_FIELD.to_string(), Value::from(phone));
        }

        fields
    }

    /// Persist one submission into the Prospect row. `answers` must
    /// already be normalized to the schema width.
    ///
    /// Never returns an error: a store failure is logged and the request
    /// continues.
    pub async fn save_to_store(
        &self,
        record_id: &str,
        legacy_code: &str,
        answers: &[String],
        email: &str,
        phone: Option<&str>,
    ) {
        if record_id.is_empty() {
            warn!("No record id to write answers to (sentinel resolution), skipping store write");
            return;
        }

        let fields = self.build_fields(legacy_code, answers, email, phone);
        let field_count = fields.len();

        match self.store.patch(record_id, Value::Object(fields)).await {
            Ok(()) => {
                info!(
                    record_id = %record_id,
                    legacy_code = %legacy_code,
                    fields = field_count,
                    "Answers saved to record store"
                );
            }
            Err(e) => {
                warn!(
                    record_id = %record_id,
                    error = %e,
                    "Answer save failed, continuing with CRM sync"
                );
            }
        }
    }
}
