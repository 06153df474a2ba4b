//! Bulk post-event dispatch endpoint.
//!
//! `POST /api/events/:event_id/thank-you` re-sends the confirmation
//! dispatch to every recorded attendee of an event. Used after an
//! access link is added late or a provider outage swallowed the
//! original sends. Per-recipient failures are counted, not fatal.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{CheckoutError, Error};
use crate::handlers::AppState;
use crate::notify::EventDisplay;

/// Response for the bulk dispatch endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ThankYouResponse {
    /// Attendees loaded for the event
    pub total: usize,
    /// Dispatches where the email went out
    pub sent: usize,
    /// Dispatches where the email step failed
    pub failed: usize,
}

/// Dispatch to every attendee of an event.
///
/// # Route
/// `POST /api/events/:event_id/thank-you`
#[instrument(skip_all, fields(event_id = %event_id))]
pub async fn thank_you_handler(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<ThankYouResponse>, Error> {
    let event = state
        .store
        .get_event(&event_id)
        .await?
        .ok_or(CheckoutError::NotFound)?;

    let attendees = state.store.list_attendees(&event_id).await?;
    let total = attendees.len();
    let mut sent = 0usize;

    for attendee in attendees {
        let display = EventDisplay {
            event_id: event.id.clone(),
            title: event.title.clone(),
            starts_at: event.date.instant().unwrap_or_else(Utc::now),
            access_link: event.access_link.clone(),
            tier_name: attendee.ticket_name.clone(),
            locale: event.locale.clone().unwrap_or_else(|| "en".to_string()),
        };

        let outcome = state
            .dispatcher
            .notify(&attendee.name, &attendee.email, &display)
            .await;
        if outcome.email_ok {
            sent += 1;
        } else {
            warn!(email = %attendee.email, "bulk dispatch failed for recipient");
        }
    }

    let failed = total - sent;
    info!(total, sent, failed, "bulk dispatch finished");

    Ok(Json(ThankYouResponse {
        total,
        sent,
        failed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let body = serde_json::to_value(ThankYouResponse {
            total: 3,
            sent: 2,
            failed: 1,
        })
        .unwrap();
        assert_eq!(body["total"], 3);
        assert_eq!(body["sent"], 2);
        assert_eq!(body["failed"], 1);
    }
}
