// Allow missing docs in this module - stripe integration is internal
#![allow(missing_docs)]

//! Stripe Integration Module
//!
//! Everything this service exchanges with the payment provider:
//!
//! - **Signature Verification**: HMAC-SHA256 validation of the
//!   `stripe-signature` header over the raw request body
//! - **Typed Events**: the webhook envelope and the checkout-session
//!   object, including the validated metadata schema embedded at
//!   session-creation time
//! - **Session Creation**: the [`PaymentProvider`] trait and the REST
//!   client that creates hosted Checkout Sessions
//!
//! # Security
//!
//! - Webhook signing secret loaded from environment; the callback
//!   endpoint fails closed when it is absent
//! - Constant-time signature comparison to prevent timing attacks
//! - Raw body verification before any parsing: no request field is
//!   trusted until the signature checks out
//! - Buyer fields come only from the metadata this service embedded;
//!   amount and currency come only from the provider's own transaction
//!   total

pub mod client;
pub mod events;
pub mod signature;

// Re-export commonly used items
pub use client::{
    CheckoutSessionRef, CreateSessionRequest, DisabledPaymentProvider, PaymentProvider,
    StripeClient,
};
pub use events::{CheckoutMetadata, CheckoutSession, StripeEvent, StripeEventKind};
pub use signature::SignatureVerifier;
