//! Pricing & eligibility resolution.
//!
//! The single authority on what a registration costs. Everything the
//! client sends about price or tier names is display-only; the checkout
//! and webhook paths both come back here (or to the state resolved
//! here) rather than trusting caller-supplied amounts.

use chrono::{DateTime, Utc};

use crate::error::{CheckoutError, Error, Result};
use crate::model::Event;
use crate::store::EventRepository;

/// Currency all sessions are created in.
pub const CURRENCY: &str = "eur";

/// Tier name synthesized for legacy single-price events.
pub const LEGACY_TIER_NAME: &str = "General Admission";

/// Server-side answer to "what does this registration cost".
#[derive(Debug, Clone)]
pub struct ResolvedTier {
    /// The event document, as read at resolution time
    pub event: Event,
    /// Tier id, `None` for the legacy synthetic tier
    pub tier_id: Option<String>,
    /// Tier display name
    pub tier_name: String,
    /// What the tier includes
    pub includes: Vec<String>,
    /// Authoritative price, major units
    pub price: f64,
    /// ISO currency code, lower-case
    pub currency: String,
}

impl ResolvedTier {
    /// Whether this resolves to a free registration.
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }
}

/// Resolve the authoritative price and tier for an event, failing on
/// any eligibility gate the stored state cannot satisfy.
pub async fn resolve(
    store: &dyn EventRepository,
    event_id: &str,
    ticket_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ResolvedTier> {
    let event = store
        .get_event(event_id)
        .await?
        .ok_or(Error::Checkout(CheckoutError::NotFound))?;

    if !event.accepts_registrations() {
        return Err(CheckoutError::Cancelled.into());
    }

    let starts_at = event.date.instant().ok_or_else(|| {
        CheckoutError::Misconfigured(format!(
            "event {} has an unparseable date: {:?}",
            event.id, event.date
        ))
    })?;
    if starts_at < now {
        return Err(CheckoutError::EventEnded.into());
    }

    let (tier_id, tier_name, includes, price) = if !event.tiers.is_empty() {
        let tier = match ticket_id {
            Some(wanted) => event
                .tiers
                .iter()
                .find(|t| t.id == wanted)
                .ok_or_else(|| CheckoutError::TicketNotFound(wanted.to_string()))?,
            // Stored order is the display order; the first tier is the
            // default offering.
            None => &event.tiers[0],
        };
        (
            Some(tier.id.clone()),
            tier.name.clone(),
            tier.includes.clone(),
            tier.price,
        )
    } else {
        let price = event.price.ok_or_else(|| {
            CheckoutError::Misconfigured(format!(
                "event {} has neither tiers nor a flat price",
                event.id
            ))
        })?;
        (None, LEGACY_TIER_NAME.to_string(), Vec::new(), price)
    };

    if !price.is_finite() || price < 0.0 {
        return Err(CheckoutError::InvalidPrice(price).into());
    }

    Ok(ResolvedTier {
        event,
        tier_id,
        tier_name,
        includes,
        price,
        currency: CURRENCY.to_string(),
    })
}
