//! Checkout-session creation.
//!
//! The [`PaymentProvider`] trait is the seam between the registration
//! path and Stripe; tests substitute a mock, production wires in
//! [`StripeClient`], a thin reqwest wrapper over
//! `POST /v1/checkout/sessions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PaymentError;
use crate::stripe::events::CheckoutMetadata;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Everything needed to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Amount in major currency units, resolved server-side
    pub amount: f64,
    /// ISO currency code, lower-case
    pub currency: String,
    /// Line-item display name (event title + tier)
    pub product_name: String,
    /// Where the provider redirects after payment
    pub success_url: String,
    /// Where the provider redirects on cancel
    pub cancel_url: String,
    /// When the session stops being payable; bounds how long a stale
    /// price quote can be paid
    pub expires_at: DateTime<Utc>,
    /// Opaque metadata the provider echoes back verbatim on completion
    pub metadata: CheckoutMetadata,
}

/// A created session: the id used later as the idempotency key, and
/// the hosted payment page URL the caller is redirected to.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRef {
    /// Session ID (cs_...)
    pub id: String,
    /// Hosted payment page URL
    pub url: String,
}

/// External payment-session creation.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a redirectable payment session for the given amount.
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSessionRef, PaymentError>;
}

/// Stripe REST client.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

/// Subset of the session object returned by the create call.
#[derive(Debug, serde::Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    /// Create a client with the given API secret key.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base (test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Build the form-encoded body for `POST /v1/checkout/sessions`.
    fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
        let unit_amount = (request.amount * 100.0).round() as i64;

        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "expires_at".to_string(),
                request.expires_at.timestamp().to_string(),
            ),
            ("customer_email".to_string(), request.metadata.email.clone()),
            (
                "metadata[event_id]".to_string(),
                request.metadata.event_id.clone(),
            ),
            ("metadata[name]".to_string(), request.metadata.name.clone()),
            (
                "metadata[surname]".to_string(),
                request.metadata.surname.clone(),
            ),
            ("metadata[email]".to_string(), request.metadata.email.clone()),
            (
                "metadata[locale]".to_string(),
                request.metadata.locale.clone(),
            ),
        ];

        if let Some(ticket_id) = &request.metadata.ticket_id {
            form.push(("metadata[ticket_id]".to_string(), ticket_id.clone()));
        }

        form
    }
}

/// Stand-in provider for deployments without an API key. The free
/// path works normally; any paid registration fails before an HTTP
/// call is made.
pub struct DisabledPaymentProvider;

#[async_trait]
impl PaymentProvider for DisabledPaymentProvider {
    async fn create_checkout_session(
        &self,
        _request: CreateSessionRequest,
    ) -> Result<CheckoutSessionRef, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSessionRef, PaymentError> {
        let form = Self::session_form(&request);

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "stripe session creation failed");
            return Err(PaymentError::SessionCreation(format!(
                "stripe returned {status}: {body}"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        let url = session.url.ok_or_else(|| {
            PaymentError::InvalidResponse("session has no hosted url".to_string())
        })?;

        Ok(CheckoutSessionRef {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_request() -> CreateSessionRequest {
        CreateSessionRequest {
            amount: 20.0,
            currency: "eur".to_string(),
            product_name: "Rust Workshop - Standard".to_string(),
            success_url: "https://app.example.com/thank-you".to_string(),
            cancel_url: "https://app.example.com/events/rust-workshop".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 12, 30, 0).unwrap(),
            metadata: CheckoutMetadata {
                event_id: "evt1".to_string(),
                ticket_id: Some("standard".to_string()),
                name: "Ada".to_string(),
                surname: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                locale: "en".to_string(),
            },
        }
    }

    #[test]
    fn test_session_form_amount_in_cents() {
        let form = StripeClient::session_form(&test_request());
        let amount = form
            .iter()
            .find(|(k, _)| k == "line_items[0][price_data][unit_amount]")
            .unwrap();
        assert_eq!(amount.1, "2000");
    }

    #[test]
    fn test_session_form_carries_metadata() {
        let form = StripeClient::session_form(&test_request());
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("metadata[event_id]"), Some("evt1"));
        assert_eq!(get("metadata[ticket_id]"), Some("standard"));
        assert_eq!(get("metadata[email]"), Some("ada@example.com"));
        assert_eq!(get("mode"), Some("payment"));
    }

    #[test]
    fn test_session_form_omits_absent_ticket() {
        let mut request = test_request();
        request.metadata.ticket_id = None;

        let form = StripeClient::session_form(&request);
        assert!(!form.iter().any(|(k, _)| k == "metadata[ticket_id]"));
    }

    #[test]
    fn test_fractional_amount_rounds() {
        let mut request = test_request();
        request.amount = 19.995;

        let form = StripeClient::session_form(&request);
        let amount = form
            .iter()
            .find(|(k, _)| k == "line_items[0][price_data][unit_amount]")
            .unwrap();
        assert_eq!(amount.1, "2000");
    }
}
