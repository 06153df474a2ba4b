//! Registrar - Event-Ticketing Checkout & Fulfillment Pipeline
//!
//! This crate provides the server side of an event registration flow:
//! server-authoritative pricing, hosted Stripe Checkout sessions for
//! paid tiers, verified payment callbacks, and exactly-once entitlement
//! records with best-effort notifications.
//!
//! # Features
//!
//! - **Pricing Resolver**: the stored event document is the only price
//!   authority; client-supplied amounts are display-only
//! - **Checkout**: free tiers fulfill immediately, paid tiers redirect
//!   to a hosted payment page
//! - **Webhook Verification**: HMAC-SHA256 over the raw body, constant
//!   time, fail-closed
//! - **Fulfillment**: idempotent on the payment-session id; duplicate
//!   deliveries collapse to one attendee record
//!
//! # Architecture
//!
//! ```text
//! Browser ──▶ POST /api/checkout ──▶ Resolver ──▶ free? ──▶ Fulfillment
//!                     │                             │            │
//!                     ▼                             ▼            ▼
//!              Stripe Checkout ──▶ POST /api/webhook ──▶ Attendee record
//!                 (hosted)          (verified, raw)      + notifications
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use registrar::config::AppConfig;
//! use registrar::store::MemoryStore;
//! use registrar::notify::{BrevoMailer, Dispatcher};
//! use registrar::fulfillment::FulfillmentEngine;
//!
//! let config = AppConfig::from_env();
//! let store = Arc::new(MemoryStore::new());
//! let mailer = Arc::new(BrevoMailer::new(&config));
//! let dispatcher = Arc::new(Dispatcher::new(mailer, config.brevo_list_id));
//! let engine = Arc::new(FulfillmentEngine::new(store, dispatcher));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod checkout;
pub mod config;
pub mod cors;
pub mod error;
pub mod fulfillment;
pub mod handlers;
pub mod model;
pub mod notify;
pub mod pricing;
pub mod store;
pub mod stripe;

// Re-exports for convenience
pub use checkout::{CheckoutService, RegistrationOutcome, RegistrationRequest};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use fulfillment::{FulfillmentEngine, FulfillmentRequest};
pub use handlers::{app_router, AppState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
