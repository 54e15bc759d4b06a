//! Deep-Dive Intake Gateway
//!
//! HTTP front door for the deep-dive survey: reconciles Prospect rows,
//! mirrors answers into the CRM, and hands the user a call-prep redirect.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepdive_gateway::{config::Args, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("deepdive_gateway={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Deep-Dive Intake Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Prospects table: {}", args.prospects_table);
    info!("Legacy code prefix: {}", args.code_prefix);
    info!("Answer slots: {}", args.answer_slot_count);
    info!("Store error policy: {:?}", args.store_error_policy);
    info!("Record store configured: {}", args.store_configured());
    info!("CRM configured: {}", args.crm_configured());
    info!(
        "Report webhook configured: {}",
        args.report_webhook_url.is_some()
    );
    info!("======================================");

    // Build state; missing collaborator credentials degrade with warnings
    let state = match server::AppState::from_args(args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize gateway state: {}", e);
            std::process::exit(1);
        }
    };

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
