//! Document models for the events, attendees and customers collections.
//!
//! Stored documents come from a schemaless store, so the models are
//! permissive where the data historically varied (the event date has
//! three persisted encodings, legacy events carry a flat `price`
//! instead of a tiers array). All of that variation is normalized here,
//! at the data-access boundary; business logic only ever sees a
//! `DateTime<Utc>` and a resolved tier.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Event lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

/// The three persisted encodings of an event's scheduled date.
///
/// Older documents store a `{ "seconds": ... }` wrapper, newer ones a
/// native millisecond timestamp, and hand-entered ones an ISO-8601
/// string. `instant()` collapses all three into one canonical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDate {
    /// Seconds-since-epoch wrapper
    Seconds {
        /// Whole seconds since the Unix epoch
        seconds: i64,
    },
    /// Native millisecond timestamp
    Millis(i64),
    /// ISO-8601 / RFC 3339 string
    Iso(String),
}

impl EventDate {
    /// Normalize into an absolute instant, or `None` if the stored
    /// value cannot be interpreted.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            EventDate::Seconds { seconds } => Utc.timestamp_opt(*seconds, 0).single(),
            EventDate::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            EventDate::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl From<DateTime<Utc>> for EventDate {
    fn from(dt: DateTime<Utc>) -> Self {
        EventDate::Millis(dt.timestamp_millis())
    }
}

/// A named, priced variant of an event's ticket offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTier {
    /// Tier id, unique within the event
    pub id: String,
    /// Display name
    pub name: String,
    /// Price in major currency units; finite and >= 0
    pub price: f64,
    /// What the tier includes, as display strings
    #[serde(default)]
    pub includes: Vec<String>,
}

/// A sellable session or resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Opaque document id
    pub id: String,
    /// Unique human-readable slug used in public URLs
    pub slug: String,
    /// Display title
    pub title: String,
    /// Display description
    #[serde(default)]
    pub description: String,
    /// Scheduled start, in whichever encoding the document carries
    pub date: EventDate,
    /// Lifecycle status
    pub status: EventStatus,
    /// When set, registration is restricted to `@<domain>` addresses
    #[serde(default)]
    pub email_domain: Option<String>,
    /// Ticket tiers in stored order; may be empty on legacy documents
    #[serde(default)]
    pub tiers: Vec<TicketTier>,
    /// Legacy flat price for single-price events without tiers
    #[serde(default)]
    pub price: Option<f64>,
    /// Access link included in the confirmation email, if any
    #[serde(default)]
    pub access_link: Option<String>,
    /// BCP 47 tag used to format the event date in confirmations
    #[serde(default)]
    pub locale: Option<String>,
    /// Counter: completed registrations
    #[serde(default)]
    pub attendee_count: u64,
    /// Counter: accumulated paid revenue in major units
    #[serde(default)]
    pub total_revenue: f64,
}

impl Event {
    /// Whether new registrations are currently allowed.
    pub fn accepts_registrations(&self) -> bool {
        self.status != EventStatus::Cancelled
    }
}

/// Payment status of an attendee record.
///
/// This pipeline only ever persists `Completed`; there is no pending
/// state. The enum exists because the collection historically carried
/// other values written by tooling outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    #[serde(other)]
    Unknown,
}

/// One successful registration (paid or free) for one event by one
/// email address. This is the entitlement record: the only document in
/// the pipeline that must never be lost or duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    /// Attendee document id
    pub id: String,
    /// Event reference
    pub event_id: String,
    /// Event title at fulfillment time, denormalized for display
    pub event_title: String,
    /// Buyer first name, sanitized
    pub name: String,
    /// Buyer surname, sanitized
    pub surname: String,
    /// Normalized (trimmed, lower-cased) email
    pub email: String,
    /// Always `completed` once written by this pipeline
    pub payment_status: PaymentStatus,
    /// External payment-session id; the idempotency key
    pub session_id: String,
    /// Resolved tier id, if the event had explicit tiers
    pub ticket_id: Option<String>,
    /// Resolved tier name
    pub ticket_name: String,
    /// Resolved tier includes
    #[serde(default)]
    pub ticket_includes: Vec<String>,
    /// Amount actually paid, in major currency units
    pub amount_paid: f64,
    /// ISO currency code, lower-case
    pub currency: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Processing instant (same as `created_at` for this pipeline)
    pub processed_at: DateTime<Utc>,
}

/// Lifetime relationship with one email address, aggregated across
/// registrations. A denormalized convenience view: it can be rebuilt
/// from attendee records and is allowed to lag behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Normalized email; the document key
    pub email: String,
    /// Most recent first name
    pub name: String,
    /// Most recent surname
    pub surname: String,
    /// Cumulative amount spent, major units
    pub total_spent: f64,
    /// Cumulative completed registrations
    pub purchase_count: u64,
    /// Distinct event ids purchased (set semantics)
    pub events: Vec<String>,
    /// Instant of the most recent purchase
    pub last_purchase: DateTime<Utc>,
}

impl Customer {
    /// Aggregate created on an email's first successful registration.
    pub fn first_purchase(
        email: &str,
        name: &str,
        surname: &str,
        event_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            surname: surname.to_string(),
            total_spent: amount,
            purchase_count: 1,
            events: vec![event_id.to_string()],
            last_purchase: at,
        }
    }

    /// Fold a subsequent purchase into the aggregate: spend and count
    /// are additive, event ids are a set, name fields are
    /// last-write-wins.
    pub fn apply_purchase(
        &mut self,
        name: &str,
        surname: &str,
        event_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) {
        self.name = name.to_string();
        self.surname = surname.to_string();
        self.total_spent += amount;
        self.purchase_count += 1;
        if !self.events.iter().any(|e| e == event_id) {
            self.events.push(event_id.to_string());
        }
        self.last_purchase = at;
    }
}

/// Discount kind on a promo code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Discount {
    /// Percentage off, 0..=100
    Percent(f64),
    /// Fixed amount off, major units
    Fixed(f64),
}

/// Promo code document. Read-only from the pipeline's perspective:
/// validation is a standalone endpoint and never feeds the resolver's
/// authoritative price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    /// The code string as entered by buyers
    pub code: String,
    /// Discount to apply at display time
    pub discount: Discount,
    /// When set, the code only applies to this event
    #[serde(default)]
    pub event_id: Option<String>,
    /// Expiry instant, if any
    #[serde(default)]
    pub expires_at: Option<EventDate>,
    /// Maximum redemptions, if capped
    #[serde(default)]
    pub max_uses: Option<u32>,
    /// Redemptions so far
    #[serde(default)]
    pub used_count: u32,
    /// Kill switch
    pub active: bool,
}

impl PromoCode {
    /// Whether the code can be shown as applicable to the given event
    /// at the given instant.
    pub fn is_valid_for(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(scoped) = &self.event_id {
            if scoped != event_id {
                return false;
            }
        }
        if let Some(expiry) = self.expires_at.as_ref().and_then(EventDate::instant) {
            if expiry < now {
                return false;
            }
        }
        if let Some(max) = self.max_uses {
            if self.used_count >= max {
                return false;
            }
        }
        true
    }

    /// Price after discount, clamped at zero. Display-only.
    pub fn discounted(&self, price: f64) -> f64 {
        let result = match self.discount {
            Discount::Percent(pct) => price * (1.0 - pct / 100.0),
            Discount::Fixed(amount) => price - amount,
        };
        result.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_date_seconds_wrapper() {
        let date: EventDate = serde_json::from_str(r#"{"seconds": 1893456000}"#).unwrap();
        let instant = date.instant().unwrap();
        assert_eq!(instant.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_event_date_millis() {
        let date: EventDate = serde_json::from_str("1893456000000").unwrap();
        let instant = date.instant().unwrap();
        assert_eq!(instant.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_event_date_iso() {
        let date: EventDate = serde_json::from_str(r#""2030-01-01T00:00:00Z""#).unwrap();
        let instant = date.instant().unwrap();
        assert_eq!(instant.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_event_date_garbage_iso() {
        let date = EventDate::Iso("next tuesday".to_string());
        assert!(date.instant().is_none());
    }

    #[test]
    fn test_parse_legacy_event_without_tiers() {
        let json = r#"{
            "id": "evt1",
            "slug": "intro-night",
            "title": "Intro Night",
            "date": "2030-06-01T18:00:00Z",
            "status": "published",
            "price": 15.0
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.tiers.is_empty());
        assert_eq!(event.price, Some(15.0));
        assert_eq!(event.attendee_count, 0);
        assert!(event.accepts_registrations());
    }

    #[test]
    fn test_cancelled_event_rejects_registrations() {
        let json = r#"{
            "id": "evt2",
            "slug": "gone",
            "title": "Gone",
            "date": 1893456000000,
            "status": "cancelled"
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        assert!(!event.accepts_registrations());
    }

    #[test]
    fn test_promo_validity() {
        let now = Utc::now();
        let promo = PromoCode {
            code: "EARLY".to_string(),
            discount: Discount::Percent(50.0),
            event_id: Some("evt1".to_string()),
            expires_at: None,
            max_uses: Some(2),
            used_count: 1,
            active: true,
        };

        assert!(promo.is_valid_for("evt1", now));
        assert!(!promo.is_valid_for("evt2", now));

        let exhausted = PromoCode {
            used_count: 2,
            ..promo.clone()
        };
        assert!(!exhausted.is_valid_for("evt1", now));
    }

    #[test]
    fn test_promo_discount_clamps_at_zero() {
        let promo = PromoCode {
            code: "BIG".to_string(),
            discount: Discount::Fixed(100.0),
            event_id: None,
            expires_at: None,
            max_uses: None,
            used_count: 0,
            active: true,
        };

        assert_eq!(promo.discounted(20.0), 0.0);
        assert_eq!(promo.discounted(150.0), 50.0);
    }

    #[test]
    fn test_payment_status_unknown_tolerated() {
        let status: PaymentStatus = serde_json::from_str(r#""refunded""#).unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
    }
}
