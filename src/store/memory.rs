//! In-memory document store.
//!
//! Backs tests and single-process deployments. Each collection sits
//! behind its own `parking_lot::RwLock`; conditional writes hold the
//! write lock across check and insert, which is what makes
//! [`AttendeeRepository::insert_attendee_if_absent`] safe to race.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::{Attendee, Customer, Event, PromoCode};
use crate::store::{
    AttendeeRepository, CustomerRepository, EventRepository, InsertOutcome, PromoRepository,
};

/// In-memory implementation of the document-store contract.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<String, Event>>,
    /// Keyed by session id (the idempotency key)
    attendees: RwLock<HashMap<String, Attendee>>,
    /// Keyed by normalized email
    customers: RwLock<HashMap<String, Customer>>,
    /// Keyed by code string
    promos: RwLock<HashMap<String, PromoCode>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an event document. Admin tooling and tests only; the
    /// pipeline itself never creates or mutates events beyond counters.
    pub fn put_event(&self, event: Event) {
        self.events.write().insert(event.id.clone(), event);
    }

    /// Seed a promo code document.
    pub fn put_promo(&self, promo: PromoCode) {
        self.promos.write().insert(promo.code.clone(), promo);
    }

    /// Number of attendee records, across all events.
    pub fn attendee_count(&self) -> usize {
        self.attendees.read().len()
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn increment_event_counters(
        &self,
        id: &str,
        attendees: u64,
        revenue: f64,
    ) -> Result<(), StoreError> {
        let mut events = self.events.write();
        let event = events
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        event.attendee_count += attendees;
        event.total_revenue += revenue;
        Ok(())
    }
}

#[async_trait]
impl AttendeeRepository for MemoryStore {
    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Attendee>, StoreError> {
        Ok(self.attendees.read().get(session_id).cloned())
    }

    async fn has_completed_registration(
        &self,
        event_id: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        use crate::model::PaymentStatus;
        Ok(self.attendees.read().values().any(|a| {
            a.event_id == event_id
                && a.email == email
                && a.payment_status == PaymentStatus::Completed
        }))
    }

    async fn insert_attendee_if_absent(
        &self,
        attendee: Attendee,
    ) -> Result<InsertOutcome, StoreError> {
        let mut attendees = self.attendees.write();
        if let Some(existing) = attendees.get(&attendee.session_id) {
            return Ok(InsertOutcome::Existing(existing.id.clone()));
        }
        let id = attendee.id.clone();
        attendees.insert(attendee.session_id.clone(), attendee);
        Ok(InsertOutcome::Inserted(id))
    }

    async fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>, StoreError> {
        Ok(self
            .attendees
            .read()
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn get_customer(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().get(email).cloned())
    }

    async fn record_purchase(
        &self,
        email: &str,
        name: &str,
        surname: &str,
        event_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut customers = self.customers.write();
        match customers.get_mut(email) {
            Some(customer) => {
                customer.apply_purchase(name, surname, event_id, amount, at);
            }
            None => {
                customers.insert(
                    email.to_string(),
                    Customer::first_purchase(email, name, surname, event_id, amount, at),
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PromoRepository for MemoryStore {
    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        Ok(self.promos.read().get(code).cloned())
    }
}
