//! Stripe Event Types
//!
//! Strongly-typed representations of the webhook events this pipeline
//! consumes, plus the metadata schema embedded at session-creation
//! time. Metadata is parsed strictly on receipt: the buyer fields a
//! callback carries must be exactly the ones we wrote, never arbitrary
//! provider-added display data.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WebhookError;

/// Stripe event types we handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StripeEventKind {
    /// Payment completed; drives fulfillment
    CheckoutCompleted,
    /// Async payment failed; logged only
    PaymentFailed,
    /// Charge refunded; logged only (refund bookkeeping is out of scope)
    ChargeRefunded,
    /// Anything else; acknowledged and ignored
    Unknown,
}

impl FromStr for StripeEventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "checkout.session.async_payment_failed" => Self::PaymentFailed,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        })
    }
}

impl StripeEventKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted => "checkout.session.completed",
            Self::PaymentFailed => "checkout.session.async_payment_failed",
            Self::ChargeRefunded => "charge.refunded",
            Self::Unknown => "unknown",
        }
    }
}

/// Generic Stripe event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Unique identifier for the event
    pub id: String,

    /// Type of event
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time of event creation (Unix timestamp)
    pub created: i64,

    /// Whether this is a live mode event
    #[serde(default)]
    pub livemode: bool,

    /// Number of times Stripe has attempted to deliver
    #[serde(default)]
    pub pending_webhooks: u32,

    /// Object containing event data
    pub data: EventData,
}

impl StripeEvent {
    /// Parse from raw JSON bytes.
    ///
    /// Call only after signature verification: the body is untrusted
    /// until then.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(bytes).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Get the typed event kind
    pub fn kind(&self) -> StripeEventKind {
        // Infallible error type means this can never fail
        StripeEventKind::from_str(&self.event_type).unwrap_or(StripeEventKind::Unknown)
    }

    /// Extract the checkout session from event data
    pub fn as_checkout_session(&self) -> Result<CheckoutSession, WebhookError> {
        match self.kind() {
            StripeEventKind::CheckoutCompleted => {
                serde_json::from_value(self.data.object.clone())
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
            }
            _ => Err(WebhookError::InvalidPayload(format!(
                "Event {} is not a checkout-session event",
                self.event_type
            ))),
        }
    }
}

/// Event data container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The actual event object (checkout session, charge, etc.)
    pub object: serde_json::Value,
}

/// Stripe checkout-session object, reduced to the fields this pipeline
/// reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (cs_...); the idempotency key for fulfillment
    pub id: String,

    /// Transaction total in minor units (cents). Authoritative: this
    /// is the one value the callback trusts the provider for, because
    /// the provider is the entity that moved the money.
    pub amount_total: Option<i64>,

    /// ISO currency code, lower-case
    pub currency: Option<String>,

    /// Provider-side payment status of the session
    #[serde(default)]
    pub payment_status: Option<String>,

    /// Metadata echoed back verbatim from session creation
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CheckoutSession {
    /// Transaction total converted to major units.
    pub fn amount_major(&self) -> Option<f64> {
        self.amount_total.map(|cents| cents as f64 / 100.0)
    }
}

/// The metadata this service embeds when creating a session, parsed
/// back strictly on callback receipt. Unknown or missing fields reject
/// the payload rather than being accessed ad hoc downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutMetadata {
    /// Event the buyer registered for
    pub event_id: String,
    /// Requested tier id, if the event has explicit tiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// Buyer first name, sanitized before embedding
    pub name: String,
    /// Buyer surname, sanitized before embedding
    pub surname: String,
    /// Normalized email
    pub email: String,
    /// Buyer locale for the confirmation email
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

impl CheckoutMetadata {
    /// Parse metadata out of a session object, rejecting malformed
    /// shapes.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, WebhookError> {
        serde_json::from_value(value.clone())
            .map_err(|e| WebhookError::InvalidPayload(format!("bad session metadata: {e}")))
    }
}
