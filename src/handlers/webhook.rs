//! Payment-callback endpoint.
//!
//! `POST /api/webhook` receives provider deliveries. The body is taken
//! raw: signature verification runs over the exact bytes on the wire,
//! before any parsing. Verification fails closed when no secret is
//! configured. A fulfillment failure returns 5xx so the provider's
//! retry mechanism redelivers; the idempotency key makes that safe.
//! Everything else, including verified bodies that fail to parse, is
//! acknowledged with a 2xx.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, WebhookError};
use crate::fulfillment::FulfillmentRequest;
use crate::handlers::AppState;
use crate::model::Event;
use crate::pricing;
use crate::stripe::{CheckoutMetadata, StripeEvent, StripeEventKind};

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Handle a payment-provider callback.
///
/// # Route
/// `POST /api/webhook`
#[instrument(skip_all)]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, Error> {
    let started = Instant::now();
    state.metrics.record_webhook();

    let verifier = state
        .verifier
        .as_ref()
        .ok_or(WebhookError::MissingSecret)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verifier.verify(&body, signature, Utc::now())?;

    // Only now is the body trusted enough to parse. A verified delivery
    // that still fails to parse is a permanent failure on our side, so
    // it is acknowledged rather than returned as an error the provider
    // would redeliver forever.
    let event = match StripeEvent::from_bytes(&body) {
        Ok(event) => event,
        Err(e) => return Ok(acknowledge_unprocessable("delivery body", &e)),
    };

    match event.kind() {
        StripeEventKind::CheckoutCompleted => {
            let session = match event.as_checkout_session() {
                Ok(session) => session,
                Err(e) => return Ok(acknowledge_unprocessable("session object", &e)),
            };
            let metadata = match CheckoutMetadata::from_value(&session.metadata) {
                Ok(metadata) => metadata,
                Err(e) => return Ok(acknowledge_unprocessable("session metadata", &e)),
            };

            // The provider moved the money, so the provider's total is
            // the authoritative amount, never the metadata.
            let amount_paid = session.amount_major().unwrap_or(0.0);
            let currency = session
                .currency
                .clone()
                .unwrap_or_else(|| pricing::CURRENCY.to_string());

            let stored = state.store.get_event(&metadata.event_id).await?;
            let (tier_name, includes) =
                tier_display(stored.as_ref(), metadata.ticket_id.as_deref());

            let attendee_id = state
                .engine
                .fulfill(FulfillmentRequest {
                    event_id: metadata.event_id.clone(),
                    idempotency_key: session.id.clone(),
                    name: metadata.name,
                    surname: metadata.surname,
                    email: metadata.email,
                    locale: metadata.locale,
                    tier_id: metadata.ticket_id,
                    tier_name,
                    includes,
                    amount_paid,
                    currency,
                    record_revenue: true,
                })
                .await
                .map_err(|e| WebhookError::FulfillmentFailed(e.to_string()))?;

            state.metrics.record_registration();
            state.metrics.record_latency(started.elapsed());
            info!(
                event_id = %metadata.event_id,
                session_id = %session.id,
                attendee_id = %attendee_id,
                amount = amount_paid,
                "paid registration fulfilled"
            );
        }
        StripeEventKind::PaymentFailed => {
            warn!(event_id = %event.id, "async payment failed; no entitlement written");
        }
        StripeEventKind::ChargeRefunded => {
            // Refund bookkeeping is manual; the delivery is acknowledged
            // so the provider stops retrying.
            warn!(event_id = %event.id, "charge refunded; manual follow-up required");
        }
        StripeEventKind::Unknown => {
            debug!(event_type = %event.event_type, "ignoring unhandled event type");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Ack a verified delivery that cannot be processed.
///
/// Redelivery cannot fix a malformed body, so the delivery is logged
/// and acknowledged instead of bounced back into the retry queue.
fn acknowledge_unprocessable(part: &str, error: &WebhookError) -> Json<Value> {
    warn!(part, error = %error, "verified delivery is unprocessable; acknowledging");
    Json(json!({ "received": true }))
}

/// Best display data for the fulfilled tier.
///
/// The callback can arrive after the event was edited (or the tier
/// removed), and money has already moved, so this never fails: it
/// degrades to the legacy tier name when the stored state no longer
/// matches.
fn tier_display(event: Option<&Event>, ticket_id: Option<&str>) -> (String, Vec<String>) {
    let Some(event) = event else {
        return (pricing::LEGACY_TIER_NAME.to_string(), Vec::new());
    };

    let tier = match ticket_id {
        Some(wanted) => event.tiers.iter().find(|t| t.id == wanted),
        None => event.tiers.first(),
    };

    match tier {
        Some(t) => (t.name.clone(), t.includes.clone()),
        None => (pricing::LEGACY_TIER_NAME.to_string(), Vec::new()),
    }
}
