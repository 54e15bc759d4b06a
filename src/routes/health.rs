//! Health check endpoints
//!
//! Liveness probe (`/health`, `/healthz`) returns 200 whenever the
//! gateway is running. Every downstream collaborator is optional and
//! best-effort, so there is no separate readiness state; the body carries
//! config-presence flags for operators instead.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response with collaborator configuration flags
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: String,
    /// Node identifier
    pub node_id: String,
    /// Whether record-store credentials are configured
    pub store_configured: bool,
    /// Whether CRM credentials are configured
    pub crm_configured: bool,
    /// Whether the report webhook is configured
    pub reports_enabled: bool,
    /// Configured answer slot count
    pub answer_slots: usize,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        node_id: state.args.node_id.to_string(),
        store_configured: state.reconciler.is_some(),
        crm_configured: state.crm.enabled(),
        reports_enabled: state.reports.enabled(),
        answer_slots: state.schema.slot_count(),
    }
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"status":"healthy","error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
///
/// Returns build information so deployments can be matched to commits.
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "deepdive-gateway",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::report::ReportQueue;
    use crate::schema::QuestionSchema;
    use clap::Parser;

    fn bare_state() -> Arc<AppState> {
        let args = Args::parse_from(["deepdive-gateway"]);
        let schema = Arc::new(QuestionSchema::with_defaults(args.answer_slot_count));
        Arc::new(AppState::with_collaborators(
            args,
            schema,
            None,
            None,
            ReportQueue::disabled(),
        ))
    }

    #[test]
    fn test_health_reports_unconfigured_collaborators() {
        let state = bare_state();
        let response = build_health_response(&state);
        assert_eq!(response.status, "healthy");
        assert!(!response.store_configured);
        assert!(!response.crm_configured);
        assert!(!response.reports_enabled);
        assert_eq!(response.answer_slots, 24);
    }

    #[test]
    fn test_health_check_returns_200() {
        let resp = health_check(bare_state());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_version_info_is_json() {
        let resp = version_info();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
