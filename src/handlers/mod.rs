//! HTTP handlers and router assembly.
//!
//! Every handler takes `State<Arc<AppState>>`; the state owns the
//! services, the store, and the runtime metrics. Routes:
//!
//! - `POST /api/checkout` - registration form submissions
//! - `POST /api/webhook` - payment-provider callbacks (raw body)
//! - `POST /api/promo/validate` - read-only promo code check
//! - `POST /api/events/:id/thank-you` - bulk post-event dispatch
//! - `GET /health`, `GET /status`, `GET /ready` - probes and metrics

pub mod promo;
pub mod register;
pub mod status;
pub mod thank_you;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::checkout::CheckoutService;
use crate::config::AppConfig;
use crate::cors::cors_layer;
use crate::fulfillment::FulfillmentEngine;
use crate::notify::Dispatcher;
use crate::store::DocumentStore;
use crate::stripe::SignatureVerifier;

use status::RuntimeMetrics;

/// Shared application state behind every handler.
pub struct AppState {
    /// Registration intent handler
    pub checkout: Arc<CheckoutService>,
    /// Fulfillment engine, invoked directly by the webhook path
    pub engine: Arc<FulfillmentEngine>,
    /// Document store, for reads the services do not cover
    pub store: Arc<dyn DocumentStore>,
    /// Notification dispatcher, for the bulk thank-you path
    pub dispatcher: Arc<Dispatcher>,
    /// Webhook signature verifier; `None` means fail closed
    pub verifier: Option<SignatureVerifier>,
    /// Runtime configuration
    pub config: AppConfig,
    /// Uptime, counters, and latency histogram for `/status`
    pub metrics: RuntimeMetrics,
}

impl AppState {
    /// Assemble state from wired services.
    pub fn new(
        checkout: Arc<CheckoutService>,
        engine: Arc<FulfillmentEngine>,
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<Dispatcher>,
        config: AppConfig,
    ) -> Self {
        let verifier = config
            .stripe_webhook_secret
            .clone()
            .map(|secret| SignatureVerifier::new(secret, config.signature_tolerance));
        Self {
            checkout,
            engine,
            store,
            dispatcher,
            verifier,
            config,
            metrics: RuntimeMetrics::new(),
        }
    }
}

/// Build the application router over the given state.
pub fn app_router(state: Arc<AppState>) -> Router {
    let app_origin = Some(state.config.base_url.clone());

    Router::new()
        .route("/api/checkout", post(register::checkout_handler))
        .route("/api/webhook", post(webhook::webhook_handler))
        .route("/api/promo/validate", post(promo::validate_handler))
        .route(
            "/api/events/:event_id/thank-you",
            post(thank_you::thank_you_handler),
        )
        .route("/health", get(status::health_handler))
        .route("/status", get(status::status_handler))
        .route("/ready", get(status::readiness_handler))
        .layer(cors_layer(app_origin))
        .with_state(state)
}
