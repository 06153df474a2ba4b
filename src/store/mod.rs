//! Document-store abstraction.
//!
//! The pipeline treats its database as a transactional key-value store
//! with document-level reads, conditional writes, and simple equality
//! queries. These traits are that contract; handlers receive them as
//! `Arc<dyn DocumentStore>` so tests can substitute doubles and the
//! backend can change without touching business logic.
//!
//! The one hard requirement (enforced here, not in application logic):
//! inserting an attendee is conditional on its session id, so duplicate
//! fulfillment collapses to a single record even under concurrency.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Attendee, Customer, Event, PromoCode};

/// Outcome of a conditional attendee insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No record existed for the session id; this one was written.
    Inserted(String),
    /// A record already existed; its id is returned, nothing written.
    Existing(String),
}

impl InsertOutcome {
    /// The attendee id, whether fresh or pre-existing.
    pub fn attendee_id(&self) -> &str {
        match self {
            Self::Inserted(id) | Self::Existing(id) => id,
        }
    }
}

/// Read and counter access to the events collection.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Fetch an event document by id.
    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError>;

    /// Atomically add to an event's counters.
    ///
    /// Best-effort from the caller's perspective; failures are logged
    /// and swallowed upstream.
    async fn increment_event_counters(
        &self,
        id: &str,
        attendees: u64,
        revenue: f64,
    ) -> Result<(), StoreError>;
}

/// Access to the attendees (entitlement) collection.
#[async_trait]
pub trait AttendeeRepository: Send + Sync {
    /// Find an attendee by its payment-session id.
    async fn find_by_session_id(&self, session_id: &str)
        -> Result<Option<Attendee>, StoreError>;

    /// Whether a completed registration exists for `(event, email)`.
    async fn has_completed_registration(
        &self,
        event_id: &str,
        email: &str,
    ) -> Result<bool, StoreError>;

    /// Write the attendee unless one already exists with the same
    /// session id. Check and write are atomic.
    async fn insert_attendee_if_absent(
        &self,
        attendee: Attendee,
    ) -> Result<InsertOutcome, StoreError>;

    /// All attendees of an event, for bulk notification.
    async fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>, StoreError>;
}

/// Access to the customers (aggregate-by-email) collection.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Fetch the aggregate for a normalized email.
    async fn get_customer(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    /// Fold one purchase into the aggregate, creating it on first
    /// purchase. The update is additive and atomic within the store.
    async fn record_purchase(
        &self,
        email: &str,
        name: &str,
        surname: &str,
        event_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Read access to promo codes.
#[async_trait]
pub trait PromoRepository: Send + Sync {
    /// Fetch a promo code document by its code string.
    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError>;
}

/// The full document-store contract the pipeline depends on.
pub trait DocumentStore:
    EventRepository + AttendeeRepository + CustomerRepository + PromoRepository
{
}

impl<T> DocumentStore for T where
    T: EventRepository + AttendeeRepository + CustomerRepository + PromoRepository
{
}
