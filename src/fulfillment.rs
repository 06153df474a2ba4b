//! Fulfillment engine.
//!
//! The idempotent procedure that durably records an entitlement and
//! triggers its downstream effects. Invoked from exactly two places:
//! the free-registration branch of checkout, and the verified payment
//! callback. It behaves identically regardless of caller.
//!
//! Priority ordering, deliberately non-transactional: the attendee
//! record is the only thing that must never be lost. The customer
//! aggregate, the event counters, and the notifications are
//! reconstructable or resendable, so their failures are logged with
//! replay context and swallowed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Attendee, PaymentStatus};
use crate::notify::{Dispatcher, EventDisplay};
use crate::store::{DocumentStore, InsertOutcome};

/// How long a spawned notification dispatch may run before it is
/// abandoned (the caller never waits on it either way).
const DISPATCH_GRACE: Duration = Duration::from_secs(15);

/// One fulfillment invocation.
#[derive(Debug, Clone)]
pub struct FulfillmentRequest {
    /// Event being registered for
    pub event_id: String,
    /// Payment-session id, or the synthetic free-path key
    pub idempotency_key: String,
    /// Buyer first name, already sanitized
    pub name: String,
    /// Buyer surname, already sanitized
    pub surname: String,
    /// Normalized email
    pub email: String,
    /// Buyer locale for the confirmation
    pub locale: String,
    /// Resolved tier id, if any
    pub tier_id: Option<String>,
    /// Resolved tier name
    pub tier_name: String,
    /// Resolved tier includes
    pub includes: Vec<String>,
    /// Amount actually paid, major units
    pub amount_paid: f64,
    /// ISO currency code, lower-case
    pub currency: String,
    /// Whether to add the amount to the event's revenue counter
    /// (payment-callback path only; free registrations move no money)
    pub record_revenue: bool,
}

/// Records entitlements exactly once and fans out side effects.
pub struct FulfillmentEngine {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<Dispatcher>,
}

impl FulfillmentEngine {
    /// Create an engine over the given store and dispatcher.
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Durably record the entitlement for `request` and trigger its
    /// side effects. Safe to replay with the same idempotency key:
    /// the existing attendee id is returned and nothing is written.
    pub async fn fulfill(&self, request: FulfillmentRequest) -> Result<String> {
        // Replay fast path. The storage-level conditional insert below
        // is the real guarantee; this just skips the event re-read on
        // obvious duplicates.
        if let Some(existing) = self
            .store
            .find_by_session_id(&request.idempotency_key)
            .await?
        {
            tracing::info!(
                session_id = %request.idempotency_key,
                attendee_id = %existing.id,
                "duplicate fulfillment collapsed"
            );
            metrics::counter!("fulfillment_replays_total").increment(1);
            return Ok(existing.id);
        }

        // Current event state, not a caller-cached copy.
        let event = self
            .store
            .get_event(&request.event_id)
            .await?
            .ok_or_else(|| {
                Error::generic(format!(
                    "fulfillment for unknown event {}",
                    request.event_id
                ))
            })?;

        let now = Utc::now();
        let attendee = Attendee {
            id: Uuid::new_v4().to_string(),
            event_id: request.event_id.clone(),
            event_title: event.title.clone(),
            name: request.name.clone(),
            surname: request.surname.clone(),
            email: request.email.clone(),
            payment_status: PaymentStatus::Completed,
            session_id: request.idempotency_key.clone(),
            ticket_id: request.tier_id.clone(),
            ticket_name: request.tier_name.clone(),
            ticket_includes: request.includes.clone(),
            amount_paid: request.amount_paid,
            currency: request.currency.clone(),
            created_at: now,
            processed_at: now,
        };

        let attendee_id = match self.store.insert_attendee_if_absent(attendee).await? {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Existing(id) => {
                // Lost the race to a concurrent duplicate; the winner's
                // record is the entitlement.
                tracing::info!(
                    session_id = %request.idempotency_key,
                    attendee_id = %id,
                    "concurrent duplicate fulfillment collapsed"
                );
                metrics::counter!("fulfillment_replays_total").increment(1);
                return Ok(id);
            }
        };

        metrics::counter!("fulfillments_total").increment(1);
        tracing::info!(
            attendee_id = %attendee_id,
            event_id = %request.event_id,
            session_id = %request.idempotency_key,
            amount = request.amount_paid,
            "entitlement recorded"
        );

        // Everything below is best-effort. The entitlement is durable;
        // each failure is logged with the ids needed to replay it.
        if let Err(e) = self
            .store
            .record_purchase(
                &request.email,
                &request.name,
                &request.surname,
                &request.event_id,
                request.amount_paid,
                now,
            )
            .await
        {
            tracing::error!(
                email = %request.email,
                event_id = %request.event_id,
                amount = request.amount_paid,
                error = %e,
                "customer aggregate update failed; aggregate will lag"
            );
            metrics::counter!("fulfillment_side_effect_failures_total", "step" => "customer")
                .increment(1);
        }

        let revenue = if request.record_revenue {
            request.amount_paid
        } else {
            0.0
        };
        if let Err(e) = self
            .store
            .increment_event_counters(&request.event_id, 1, revenue)
            .await
        {
            tracing::error!(
                event_id = %request.event_id,
                error = %e,
                "event counter increment failed"
            );
            metrics::counter!("fulfillment_side_effect_failures_total", "step" => "counters")
                .increment(1);
        }

        // Dispatch after the entitlement write, off the request path.
        let display = EventDisplay {
            event_id: event.id.clone(),
            title: event.title.clone(),
            starts_at: event.date.instant().unwrap_or(now),
            access_link: event.access_link.clone(),
            tier_name: request.tier_name.clone(),
            locale: request.locale.clone(),
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let name = request.name.clone();
        let email = request.email.clone();
        tokio::spawn(async move {
            if tokio::time::timeout(DISPATCH_GRACE, dispatcher.notify(&name, &email, &display))
                .await
                .is_err()
            {
                tracing::warn!(email = %email, "notification dispatch timed out");
            }
        });

        Ok(attendee_id)
    }
}
