//! Registration intent handling.
//!
//! The synchronous request path behind the registration form. Runs the
//! eligibility gates in order, then branches: free registrations are
//! fulfilled immediately, paid ones get a hosted payment session and a
//! redirect URL. Price always comes from the resolver; a price field in
//! the request body is ignored.

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::config::AppConfig;
use crate::error::{CheckoutError, Error, Result};
use crate::fulfillment::{FulfillmentEngine, FulfillmentRequest};
use crate::pricing;
use crate::store::DocumentStore;
use crate::stripe::{CheckoutMetadata, CreateSessionRequest, PaymentProvider};

/// Hard cap on stored name fields.
const NAME_MAX_LEN: usize = 200;

/// A registration form submission.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Event to register for
    pub event_id: String,
    /// Requested tier, if the event has explicit tiers
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Buyer first name
    pub customer_name: String,
    /// Buyer surname
    pub customer_surname: String,
    /// Buyer email, un-normalized
    pub customer_email: String,
    /// Buyer locale tag
    #[serde(default)]
    pub locale: Option<String>,
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Paid path: redirect the buyer to the hosted payment page.
    Redirect {
        /// Hosted payment page URL
        url: String,
    },
    /// Free path: already fulfilled; redirect to the success page.
    Fulfilled {
        /// Success page URL
        url: String,
    },
}

impl RegistrationOutcome {
    /// The redirect target, regardless of branch.
    pub fn url(&self) -> &str {
        match self {
            Self::Redirect { url } | Self::Fulfilled { url } => url,
        }
    }
}

/// The registration intent handler.
pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    payment: Arc<dyn PaymentProvider>,
    engine: Arc<FulfillmentEngine>,
    config: AppConfig,
}

impl CheckoutService {
    /// Wire up the service.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payment: Arc<dyn PaymentProvider>,
        engine: Arc<FulfillmentEngine>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            payment,
            engine,
            config,
        }
    }

    /// Process a registration submission. Each gate is hard: the first
    /// failure is returned and nothing downstream runs.
    pub async fn register(&self, request: RegistrationRequest) -> Result<RegistrationOutcome> {
        let raw_email = request.customer_email.trim();
        if !is_valid_email(raw_email) {
            return Err(CheckoutError::InvalidEmail.into());
        }

        let now = Utc::now();
        let resolved =
            pricing::resolve(self.store.as_ref(), &request.event_id, request.ticket_id.as_deref(), now)
                .await?;

        if let Some(required) = &resolved.event.email_domain {
            if !email_matches_domain(raw_email, required) {
                return Err(CheckoutError::DomainRestricted(required.clone()).into());
            }
        }

        let email = normalize_email(raw_email);

        // Check-then-write without a cross-request lock: two
        // near-simultaneous submissions from the same email can both
        // pass this gate. Accepted as a rare, operator-deduplicatable
        // case; the paid path's session-id key has the real
        // storage-level uniqueness.
        if self
            .store
            .has_completed_registration(&request.event_id, &email)
            .await?
        {
            return Err(CheckoutError::AlreadyRegistered.into());
        }

        let name = sanitize_name(&request.customer_name);
        let surname = sanitize_name(&request.customer_surname);
        let locale = request.locale.unwrap_or_else(|| "en".to_string());

        if resolved.is_free() {
            let key = format!("free_{}_{}", request.event_id, now.timestamp_millis());
            self.engine
                .fulfill(FulfillmentRequest {
                    event_id: request.event_id.clone(),
                    idempotency_key: key,
                    name,
                    surname,
                    email,
                    locale,
                    tier_id: resolved.tier_id,
                    tier_name: resolved.tier_name,
                    includes: resolved.includes,
                    amount_paid: 0.0,
                    currency: resolved.currency,
                    record_revenue: false,
                })
                .await
                .map_err(|e| {
                    tracing::error!(event_id = %request.event_id, error = %e, "free fulfillment failed");
                    Error::Checkout(CheckoutError::CheckoutFailed(e.to_string()))
                })?;

            return Ok(RegistrationOutcome::Fulfilled {
                url: self.config.success_url(),
            });
        }

        let metadata = CheckoutMetadata {
            event_id: request.event_id.clone(),
            ticket_id: resolved.tier_id.clone(),
            name,
            surname,
            email,
            locale,
        };

        let session = self
            .payment
            .create_checkout_session(CreateSessionRequest {
                amount: resolved.price,
                currency: resolved.currency,
                product_name: format!("{} - {}", resolved.event.title, resolved.tier_name),
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(&resolved.event.slug),
                expires_at: now + self.config.session_expiry,
                metadata,
            })
            .await
            .map_err(|e| {
                tracing::error!(event_id = %request.event_id, error = %e, "session creation failed");
                Error::Checkout(CheckoutError::CheckoutFailed(e.to_string()))
            })?;

        metrics::counter!("checkout_sessions_created_total").increment(1);
        tracing::info!(
            event_id = %request.event_id,
            session_id = %session.id,
            amount = resolved.price,
            "checkout session created"
        );

        Ok(RegistrationOutcome::Redirect { url: session.url })
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Standard address-pattern check on the raw (trimmed) input.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 320 && email_regex().is_match(email)
}

/// Trim and lower-case; the canonical form for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case-insensitive exact match on the address's domain part.
pub fn email_matches_domain(email: &str, required: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain.eq_ignore_ascii_case(required),
        None => false,
    }
}

/// Bound stored name data: trim, strip angle brackets, cap length.
/// Keeps trivially-injectable markup out of later-rendered emails.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(NAME_MAX_LEN)
        .collect();
    cleaned
}
