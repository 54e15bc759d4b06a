//! Report generation trigger — fire-and-forget
//!
//! Report generation (LLM text, PDF rendering, delivery) runs in a
//! separate service behind a webhook. The gateway only enqueues the legacy
//! code onto an in-process channel; a spawned worker task drains it and
//! calls the generator. The `/submit` response never waits on, and never
//! learns about, report failures.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::types::{GatewayError, Result};

/// The report pipeline as seen from the gateway: a single trigger call
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn trigger(&self, legacy_code: &str) -> Result<()>;
}

/// Triggers the external report service via webhook POST
pub struct WebhookReportGenerator {
    http: reqwest::Client,
    url: String,
}

impl WebhookReportGenerator {
    /// Build from configuration; None when no webhook URL is set
    pub fn from_args(args: &Args) -> Option<Self> {
        let url = args.report_webhook_url.clone()?;
        Some(Self::new(url, args.http_timeout()))
    }

    pub fn new(url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, url }
    }
}

#[async_trait]
impl ReportGenerator for WebhookReportGenerator {
    async fn trigger(&self, legacy_code: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "legacy_code": legacy_code }))
            .send()
            .await
            .map_err(|e| GatewayError::Report(format!("report webhook transport error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Report(format!(
                "report webhook returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Handle to the report worker: non-blocking enqueue, or a no-op when
/// report generation is not configured
pub struct ReportQueue {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl ReportQueue {
    /// Queue that drops every trigger (no generator configured)
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Spawn the worker task and return its enqueue handle
    pub fn spawn(generator: Arc<dyn ReportGenerator>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(legacy_code) = rx.recv().await {
                match generator.trigger(&legacy_code).await {
                    Ok(()) => {
                        info!(legacy_code = %legacy_code, "Report generation triggered");
                    }
                    Err(e) => {
                        warn!(legacy_code = %legacy_code, error = %e, "Report trigger failed");
                    }
                }
            }
        });

        Self { tx: Some(tx) }
    }

    pub fn enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueue a report trigger. Returns immediately; failures downstream
    /// are logged by the worker.
    pub fn enqueue(&self, legacy_code: &str) {
        match &self.tx {
            Some(tx) => {
                if tx.send(legacy_code.to_string()).is_err() {
                    warn!(legacy_code = %legacy_code, "Report worker gone, trigger dropped");
                }
            }
            None => {
                debug!(legacy_code = %legacy_code, "Report generation not configured, skipping");
            }
        }
    }
}
