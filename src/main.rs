//! Registrar Server
//!
//! Event-ticketing checkout and fulfillment service.

use std::sync::Arc;

use clap::Parser;

use registrar::checkout::CheckoutService;
use registrar::config::AppConfig;
use registrar::fulfillment::FulfillmentEngine;
use registrar::handlers::{app_router, AppState};
use registrar::notify::{BrevoMailer, Dispatcher};
use registrar::store::MemoryStore;
use registrar::stripe::{DisabledPaymentProvider, PaymentProvider, StripeClient};

/// Registrar Server
#[derive(Parser, Debug)]
#[command(name = "registrar")]
#[command(version)]
#[command(about = "Event-ticketing checkout and fulfillment service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file of event documents to load at startup
    #[arg(long)]
    events: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();

    if config.stripe_webhook_secret.is_none() {
        tracing::warn!(
            "no webhook secret configured; payment callbacks will be rejected"
        );
    }

    let store = Arc::new(MemoryStore::new());

    if let Some(path) = &args.events {
        let raw = std::fs::read_to_string(path)?;
        let events: Vec<registrar::model::Event> = serde_json::from_str(&raw)?;
        let count = events.len();
        for event in events {
            store.put_event(event);
        }
        tracing::info!(count, "loaded event documents");
    }

    let payment: Arc<dyn PaymentProvider> = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeClient::new(key.clone())),
        None => {
            tracing::warn!("no payment API key configured; only free registrations will work");
            Arc::new(DisabledPaymentProvider)
        }
    };

    let mailer = Arc::new(BrevoMailer::new(&config));
    let dispatcher = Arc::new(Dispatcher::new(mailer, config.brevo_list_id));
    let engine = Arc::new(FulfillmentEngine::new(store.clone(), dispatcher.clone()));
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        payment,
        engine.clone(),
        config.clone(),
    ));

    let state = Arc::new(AppState::new(
        checkout,
        engine,
        store,
        dispatcher,
        config,
    ));
    let app = app_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("registrar listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
