//! Configuration for the intake gateway
//!
//! CLI arguments and environment variable handling using clap. All knobs are
//! read exactly once at startup and passed into constructors; business logic
//! never touches the environment.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Policy applied when the record store fails during reconciliation
///
/// `Abort` surfaces a 500 to the caller. `Degrade` substitutes sentinel
/// placeholder identifiers and lets the submission continue so the user is
/// never blocked on a third-party outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreErrorPolicy {
    Abort,
    Degrade,
}

/// Deep-Dive Intake Gateway
///
/// Collects survey submissions, reconciles Prospect rows in the record
/// store, and mirrors answers into the CRM.
#[derive(Parser, Debug, Clone)]
#[command(name = "deepdive-gateway")]
#[command(about = "HTTP gateway for deep-dive survey intake")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Record store API key (submissions degrade to sentinel codes when absent)
    #[arg(long, env = "STORE_API_KEY")]
    pub store_api_key: Option<String>,

    /// Record store base identifier
    #[arg(long, env = "STORE_BASE_ID")]
    pub store_base_id: Option<String>,

    /// Record store REST endpoint
    #[arg(long, env = "STORE_BASE_URL", default_value = "https://api.airtable.com/v0")]
    pub store_base_url: String,

    /// Prospects table name in the record store
    #[arg(long, env = "STORE_PROSPECTS_TABLE", default_value = "Prospects")]
    pub prospects_table: String,

    /// Column label holding the prospect email (lookup key, exact match)
    #[arg(long, env = "STORE_EMAIL_FIELD", default_value = "Prospect Email")]
    pub email_field: String,

    /// Column label holding the generated legacy code
    #[arg(long, env = "STORE_CODE_FIELD", default_value = "Legacy Code")]
    pub code_field: String,

    /// Column label holding the store-assigned auto number
    #[arg(long, env = "STORE_AUTONUM_FIELD", default_value = "AutoNum")]
    pub autonum_field: String,

    /// Legacy code prefix
    #[arg(long, env = "LEGACY_CODE_PREFIX", default_value = "Legacy-X25-OP")]
    pub code_prefix: String,

    /// Offset added to the store auto number when deriving a legacy code
    #[arg(long, env = "LEGACY_CODE_BASE_OFFSET", default_value = "1000")]
    pub code_base_offset: i64,

    /// CRM API key (CRM sync becomes a no-op when absent)
    #[arg(long, env = "CRM_API_KEY")]
    pub crm_api_key: Option<String>,

    /// CRM location identifier
    #[arg(long, env = "CRM_LOCATION_ID")]
    pub crm_location_id: Option<String>,

    /// CRM REST endpoint
    #[arg(long, env = "CRM_BASE_URL", default_value = "https://rest.gohighlevel.com/v1")]
    pub crm_base_url: String,

    /// Delay between per-slot CRM field updates, in milliseconds
    /// (stays under the CRM's undocumented rate limit)
    #[arg(long, env = "CRM_SLOT_DELAY_MS", default_value = "350")]
    pub crm_slot_delay_ms: u64,

    /// Backoff before retrying a rate-limited (429) CRM call, in milliseconds
    #[arg(long, env = "CRM_RETRY_BACKOFF_MS", default_value = "1000")]
    pub crm_retry_backoff_ms: u64,

    /// Base URL the client is redirected to after submission
    #[arg(
        long,
        env = "CALL_PREP_URL_BASE",
        default_value = "https://poweredbylegacycode.com/call-prep"
    )]
    pub redirect_base_url: String,

    /// Number of fixed-width answer slots (Q7 onward)
    #[arg(long, env = "ANSWER_SLOT_COUNT", default_value = "24")]
    pub answer_slot_count: usize,

    /// Optional path to a deployment-specific question schema (JSON)
    /// CRM custom-field key lists drift between deployments; this overrides
    /// the built-in defaults without a rebuild.
    #[arg(long, env = "QUESTION_SCHEMA_FILE")]
    pub schema_file: Option<String>,

    /// Policy when the record store fails during reconciliation
    #[arg(long, env = "STORE_ERROR_POLICY", value_enum, default_value = "degrade")]
    pub store_error_policy: StoreErrorPolicy,

    /// Report service webhook URL (report triggers disabled when absent)
    #[arg(long, env = "REPORT_WEBHOOK_URL")]
    pub report_webhook_url: Option<String>,

    /// Timeout for collaborator HTTP calls, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "20")]
    pub http_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Whether the record store credentials are configured
    pub fn store_configured(&self) -> bool {
        self.store_api_key.is_some() && self.store_base_id.is_some()
    }

    /// Whether the CRM credentials are configured
    pub fn crm_configured(&self) -> bool {
        self.crm_api_key.is_some() && self.crm_location_id.is_some()
    }

    /// Timeout applied to every collaborator HTTP call
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Inter-slot pacing delay for the CRM update loop
    pub fn crm_slot_delay(&self) -> Duration {
        Duration::from_millis(self.crm_slot_delay_ms)
    }

    /// Backoff before the single 429 retry
    pub fn crm_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.crm_retry_backoff_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.answer_slot_count == 0 {
            return Err("ANSWER_SLOT_COUNT must be at least 1".to_string());
        }

        if self.code_prefix.trim().is_empty() {
            return Err("LEGACY_CODE_PREFIX must not be empty".to_string());
        }

        if self.code_base_offset < 0 {
            return Err("LEGACY_CODE_BASE_OFFSET must not be negative".to_string());
        }

        Ok(())
    }
}
