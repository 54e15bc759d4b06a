//! Deep-Dive Intake Gateway
//!
//! A stateless HTTP gateway that collects multi-step "deep dive" survey
//! submissions from a chat-style front end and fans them out:
//!
//! - **Reconciler**: find-or-create a durable Prospect row in the external
//!   record store, keyed by email, carrying a stable generated legacy code
//! - **Propagator**: write the fixed-width answer set into the Prospect row
//!   and best-effort-mirror it into the external CRM contact
//! - **Reports**: fire-and-forget report-generation trigger, decoupled from
//!   the request path via an in-process queue
//!
//! All durable state lives in the external record store; the gateway holds
//! no state between requests. The `/submit` endpoint always answers with a
//! redirect URL once an email is present — downstream outages degrade, they
//! never block the user.

pub mod config;
pub mod crm;
pub mod propagator;
pub mod redirect;
pub mod report;
pub mod routes;
pub mod schema;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
