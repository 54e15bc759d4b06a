//! Survey submission endpoint
//!
//! `POST /submit` with `{email, answers: array|map, phone?}`. The contract
//! is asymmetric on purpose: a blank email is the only input that blocks
//! the response (400, zero collaborator calls). Everything downstream —
//! record store outage, CRM drift, report failures — degrades while the
//! caller still receives a 200 with a redirect URL. The user's flow keeps
//! moving even when every third party is down.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::StoreErrorPolicy;
use crate::redirect::build_redirect_url;
use crate::schema::AnswerInput;
use crate::server::AppState;
use crate::store::Resolution;
use crate::types::GatewayError;

use super::json_response;

/// Submission body posted by the chat wizard
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub answers: AnswerInput,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Handle `POST /submit`
pub async fn handle_submit(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read submission body");
            return json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "error": "Unreadable request body" }),
            );
        }
    };

    let submission: SubmitRequest = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "Submission body is not valid JSON");
            return json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "error": "Invalid JSON body" }),
            );
        }
    };

    let (status, body) = process(&state, submission).await;
    json_response(status, &body)
}

/// Run one submission through reconcile → save → sync → report → redirect
pub(crate) async fn process(state: &AppState, submission: SubmitRequest) -> (StatusCode, Value) {
    let email = submission.email.trim().to_string();
    if email.is_empty() {
        return (StatusCode::BAD_REQUEST, json!({ "error": "Missing email" }));
    }
    let phone = submission.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let answers = state.schema.normalize(&submission.answers);

    // Reconcile the Prospect row; the store-error policy decides whether a
    // failure aborts the request or degrades to sentinel identifiers
    let resolution = match &state.reconciler {
        Some(reconciler) => match reconciler.resolve(&email).await {
            Ok(resolution) => resolution,
            Err(GatewayError::Validation(msg)) => {
                return (StatusCode::BAD_REQUEST, json!({ "error": msg }));
            }
            Err(e) => match state.args.store_error_policy {
                StoreErrorPolicy::Abort => {
                    error!(email = %email, error = %e, "Reconciliation failed, aborting");
                    let (status, message) = e.into_status_code_and_body();
                    return (status, json!({ "error": message }));
                }
                StoreErrorPolicy::Degrade => {
                    warn!(email = %email, error = %e, "Reconciliation failed, degrading to sentinel code");
                    Resolution::sentinel()
                }
            },
        },
        None => {
            debug!("Record store not configured, using sentinel resolution");
            Resolution::sentinel()
        }
    };

    // Persist answers; failures are logged inside and never block
    if let Some(propagator) = &state.propagator {
        propagator
            .save_to_store(
                &resolution.record_id,
                &resolution.legacy_code,
                &answers,
                &email,
                phone,
            )
            .await;
    }

    // Best-effort CRM mirror; resolves the assigned owner when one exists
    let owner = state
        .crm
        .sync(
            &email,
            &resolution.legacy_code,
            &answers,
            phone,
            Some(&resolution.record_id),
        )
        .await;

    // Fire-and-forget report trigger; a sentinel code has no row to report on
    if !resolution.is_sentinel() {
        state.reports.enqueue(&resolution.legacy_code);
    }

    let redirect_url = build_redirect_url(&state.args.redirect_base_url, owner.as_deref());
    (
        StatusCode::OK,
        json!({
            "redirect_url": redirect_url,
            "legacy_code": resolution.legacy_code,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::crm::testing::MockCrm;
    use crate::crm::{CrmApi, CrmContact};
    use crate::report::testing::RecordingGenerator;
    use crate::report::ReportQueue;
    use crate::schema::{QuestionSchema, NO_RESPONSE};
    use crate::store::testing::MockRecordStore;
    use crate::store::RecordStore;
    use clap::Parser;
    use std::sync::atomic::Ordering;

    fn test_args() -> Args {
        let mut args = Args::parse_from(["deepdive-gateway"]);
        // No pacing in tests
        args.crm_slot_delay_ms = 0;
        args.crm_retry_backoff_ms = 0;
        args
    }

    fn state_with(
        args: Args,
        store: Option<Arc<MockRecordStore>>,
        crm: Option<Arc<MockCrm>>,
        reports: ReportQueue,
    ) -> AppState {
        let schema = Arc::new(QuestionSchema::with_defaults(args.answer_slot_count));
        AppState::with_collaborators(
            args,
            schema,
            store.map(|s| s as Arc<dyn RecordStore>),
            crm.map(|c| c as Arc<dyn CrmApi>),
            reports,
        )
    }

    fn submission(email: &str, answers: Vec<String>) -> SubmitRequest {
        SubmitRequest {
            email: email.to_string(),
            answers: crate::schema::AnswerInput::Positional(answers),
            phone: None,
        }
    }

    fn contact_owned_by(owner: &str) -> CrmContact {
        let mut fields = serde_json::Map::new();
        fields.insert("id".into(), "c1".into());
        fields.insert("email".into(), "a@x.com".into());
        fields.insert("assignedUserId".into(), owner.into());
        CrmContact {
            id: "c1".into(),
            fields,
        }
    }

    #[test]
    fn test_submit_request_decoding_variants() {
        let positional: SubmitRequest =
            serde_json::from_str(r#"{"email":"a@x.com","answers":["r1","r2"]}"#).unwrap();
        assert_eq!(positional.email, "a@x.com");

        let named: SubmitRequest = serde_json::from_str(
            r#"{"email":"a@x.com","answers":{"q7_history":"x"},"phone":"+1555"}"#,
        )
        .unwrap();
        assert_eq!(named.phone.as_deref(), Some("+1555"));

        // Missing answers entirely is still a valid submission
        let bare: SubmitRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(matches!(
            bare.answers,
            crate::schema::AnswerInput::Positional(ref v) if v.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_scenario_new_email_end_to_end() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let answers: Vec<String> = (0..24).map(|i| format!("r{}", i + 1)).collect();
        let state = state_with(args, Some(store.clone()), None, ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", answers)).await;

        assert_eq!(status, StatusCode::OK);
        let redirect = body["redirect_url"].as_str().unwrap();
        assert!(redirect.starts_with(&state.args.redirect_base_url));
        assert_eq!(body["legacy_code"], "Legacy-X25-OP1001");

        assert_eq!(store.record_count(), 1);
        let record = store.record("rec000001").unwrap();
        assert_eq!(record.text_field("Legacy Code"), Some("Legacy-X25-OP1001"));
        assert_eq!(record.text_field("Q7 Business History"), Some("r1"));
        assert_eq!(record.text_field("Q30 Anything Else"), Some("r24"));
    }

    #[tokio::test]
    async fn test_scenario_resubmission_overwrites_without_duplicating() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let state = state_with(args, Some(store.clone()), None, ReportQueue::disabled());

        let (_, first) = process(&state, submission("a@x.com", vec!["old".into()])).await;
        let (_, second) = process(&state, submission("a@x.com", vec!["new".into()])).await;

        // One Prospect, one stable code across both submissions
        assert_eq!(store.record_count(), 1);
        assert_eq!(first["legacy_code"], second["legacy_code"]);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);

        // Answers reflect only the second submission
        let record = store.record("rec000001").unwrap();
        assert_eq!(record.text_field("Q7 Business History"), Some("new"));
        assert_eq!(record.text_field("Q8 Goal Style"), Some(NO_RESPONSE));
    }

    #[tokio::test]
    async fn test_scenario_missing_email_blocks_with_400() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let state = state_with(args, Some(store.clone()), None, ReportQueue::disabled());

        let (status, body) = process(&state, submission("", vec!["r1".into()])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing email");
        // Zero store calls of any kind
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.patch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scenario_crm_unset_still_redirects() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let state = state_with(args, Some(store), None, ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", vec!["r1".into()])).await;

        assert_eq!(status, StatusCode::OK);
        // No owner: redirect is the bare base URL
        assert_eq!(
            body["redirect_url"].as_str().unwrap(),
            state.args.redirect_base_url
        );
    }

    #[tokio::test]
    async fn test_owner_id_lands_in_redirect() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let crm = Arc::new(MockCrm::with_contact(contact_owned_by("u42")));
        let state = state_with(args, Some(store), Some(crm), ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", vec!["r1".into()])).await;

        assert_eq!(status, StatusCode::OK);
        let redirect = body["redirect_url"].as_str().unwrap();
        assert!(redirect.ends_with("?uid=u42"), "got {}", redirect);
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_sentinel_by_default() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        store.fail_all.store(true, Ordering::SeqCst);
        let state = state_with(args, Some(store), None, ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", vec!["r1".into()])).await;

        // Degrade policy: the user still gets their redirect
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["legacy_code"], "PENDING");
        assert!(body["redirect_url"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_store_outage_aborts_under_abort_policy() {
        let mut args = test_args();
        args.store_error_policy = StoreErrorPolicy::Abort;
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        store.fail_all.store(true, Ordering::SeqCst);
        let state = state_with(args, Some(store), None, ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", vec!["r1".into()])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_report_triggered_for_real_code_only() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let (generator, mut rx) = RecordingGenerator::new();
        let state = state_with(
            args,
            Some(store),
            None,
            ReportQueue::spawn(generator.clone()),
        );

        process(&state, submission("a@x.com", vec!["r1".into()])).await;

        let triggered =
            tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
                .await
                .expect("report trigger never arrived")
                .unwrap();
        assert_eq!(triggered, "Legacy-X25-OP1001");
    }

    #[tokio::test]
    async fn test_no_report_trigger_on_sentinel() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        store.fail_all.store(true, Ordering::SeqCst);
        let (generator, _rx) = RecordingGenerator::new();
        let state = state_with(
            args,
            Some(store),
            None,
            ReportQueue::spawn(generator.clone()),
        );

        process(&state, submission("a@x.com", vec!["r1".into()])).await;

        // Give the worker a chance to (incorrectly) run
        tokio::task::yield_now().await;
        assert!(generator.triggered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crm_sync_failure_never_blocks_response() {
        let args = test_args();
        let store = Arc::new(MockRecordStore::new(&args.autonum_field));
        let crm = Arc::new(MockCrm::with_contact(contact_owned_by("u1")));
        // Every slot rejected in both shapes
        for slot in QuestionSchema::with_defaults(24).slots() {
            crm.reject_key(&slot.crm_key);
            crm.reject_key(&slot.crm_key_fallback);
        }
        let state = state_with(args, Some(store), Some(crm), ReportQueue::disabled());

        let (status, body) = process(&state, submission("a@x.com", vec!["r1".into()])).await;

        assert_eq!(status, StatusCode::OK);
        // Owner still resolved from the lookup even though every field failed
        assert!(body["redirect_url"].as_str().unwrap().ends_with("?uid=u1"));
    }
}
