//! HTTP server implementation
//!
//! hyper http1 accept loop with a match-based router. One shared
//! `AppState` carries the configuration and the collaborator handles; the
//! collaborators sit behind trait objects so tests can swap in scripted
//! implementations.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::crm::{CrmApi, CrmClient, CrmSync, CrmSyncConfig};
use crate::propagator::AnswerPropagator;
use crate::report::{ReportQueue, WebhookReportGenerator};
use crate::routes;
use crate::schema::QuestionSchema;
use crate::store::{ProspectReconciler, RecordStore, RecordStoreClient};
use crate::types::{GatewayError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub schema: Arc<QuestionSchema>,
    /// Present only when the record store is configured
    pub reconciler: Option<Arc<ProspectReconciler>>,
    pub propagator: Option<Arc<AnswerPropagator>>,
    pub crm: Arc<CrmSync>,
    pub reports: Arc<ReportQueue>,
}

impl AppState {
    /// Wire up state from explicit collaborators (used by tests and by
    /// `from_args`)
    pub fn with_collaborators(
        args: Args,
        schema: Arc<QuestionSchema>,
        store: Option<Arc<dyn RecordStore>>,
        crm_client: Option<Arc<dyn CrmApi>>,
        reports: ReportQueue,
    ) -> Self {
        let reconciler = store
            .as_ref()
            .map(|s| Arc::new(ProspectReconciler::new(Arc::clone(s), &args)));
        let propagator = store.as_ref().map(|s| {
            Arc::new(AnswerPropagator::new(
                Arc::clone(s),
                Arc::clone(&schema),
                &args.code_field,
            ))
        });
        let crm = Arc::new(CrmSync::new(
            crm_client,
            Arc::clone(&schema),
            CrmSyncConfig::from_args(&args),
        ));

        Self {
            args,
            schema,
            reconciler,
            propagator,
            crm,
            reports: Arc::new(reports),
        }
    }

    /// Build state from configuration, constructing the real REST clients.
    /// Missing collaborator credentials degrade with a warning.
    pub fn from_args(args: Args) -> Result<Self> {
        let schema = match &args.schema_file {
            Some(path) => {
                let schema = QuestionSchema::from_file(path, args.answer_slot_count)?;
                info!(path = %path, slots = schema.slot_count(), "Question schema loaded from file");
                Arc::new(schema)
            }
            None => Arc::new(QuestionSchema::with_defaults(args.answer_slot_count)),
        };

        let store: Option<Arc<dyn RecordStore>> = match RecordStoreClient::from_args(&args) {
            Some(client) => Some(Arc::new(client)),
            None => {
                warn!("Record store credentials not set, submissions will carry sentinel codes");
                None
            }
        };

        let crm_client: Option<Arc<dyn CrmApi>> = match CrmClient::from_args(&args) {
            Some(client) => Some(Arc::new(client)),
            None => {
                warn!("CRM credentials not set, contact sync disabled");
                None
            }
        };

        let reports = match WebhookReportGenerator::from_args(&args) {
            Some(generator) => ReportQueue::spawn(Arc::new(generator)),
            None => {
                info!("Report webhook not set, report triggers disabled");
                ReportQueue::disabled()
            }
        };

        Ok(Self::with_collaborators(
            args, schema, store, crm_client, reports,
        ))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen)
        .await
        .map_err(|e| GatewayError::Internal(format!("bind {} failed: {}", state.args.listen, e)))?;

    info!(
        "Gateway listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Survey submission - the one endpoint with a body contract.
        // /submit_plan kept as an alias for older front-end revisions.
        (Method::POST, "/submit") | (Method::POST, "/submit_plan") => {
            routes::handle_submit(Arc::clone(&state), req).await
        }

        // Liveness probe with config-presence flags
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // Chat UI entry point
        (Method::GET, "/") => routes::chat_page(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 404 response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": format!("Not found: {}", path) }).to_string();
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
