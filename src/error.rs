//! Error types for Registrar
//!
//! This module provides the error type hierarchy using `thiserror`,
//! plus the axum response mapping that decides what each failure kind
//! is allowed to tell the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The main error type for Registrar operations
#[derive(Error, Debug)]
pub enum Error {
    /// Checkout and eligibility errors
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment-callback verification errors
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Document-store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Payment-provider errors
    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Eligibility and checkout failures.
///
/// The validation kinds are expected, user-recoverable conditions and
/// are surfaced verbatim; configuration kinds are logged server-side
/// and replaced with a generic message at the HTTP boundary.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// No event exists for the given id
    #[error("Event not found")]
    NotFound,

    /// Event is cancelled, no new registrations
    #[error("This event has been cancelled")]
    Cancelled,

    /// Event's scheduled date is in the past
    #[error("This event has ended")]
    EventEnded,

    /// Stored event data cannot be interpreted (operator error)
    #[error("Event is misconfigured: {0}")]
    Misconfigured(String),

    /// Requested ticket tier does not exist on the event
    #[error("Ticket tier not found: {0}")]
    TicketNotFound(String),

    /// Resolved price is not a finite number >= 0
    #[error("Invalid price configured: {0}")]
    InvalidPrice(f64),

    /// Email does not match the address pattern
    #[error("Invalid email address")]
    InvalidEmail,

    /// Event restricts registration to a specific email domain
    #[error("Registration is restricted to @{0} addresses")]
    DomainRestricted(String),

    /// A completed registration already exists for this event and email
    #[error("You are already registered for this event")]
    AlreadyRegistered,

    /// Catch-all for unexpected downstream failures
    #[error("Checkout failed")]
    CheckoutFailed(String),
}

impl CheckoutError {
    /// Whether the caller can act on the specific message.
    ///
    /// Validation kinds are shown verbatim; everything else is
    /// replaced with a generic message so configuration state never
    /// leaks to the client.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::Cancelled
                | Self::EventEnded
                | Self::TicketNotFound(_)
                | Self::InvalidEmail
                | Self::DomainRestricted(_)
                | Self::AlreadyRegistered
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Cancelled
            | Self::EventEnded
            | Self::TicketNotFound(_)
            | Self::InvalidEmail
            | Self::DomainRestricted(_)
            | Self::AlreadyRegistered => StatusCode::BAD_REQUEST,
            Self::Misconfigured(_) | Self::InvalidPrice(_) | Self::CheckoutFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Payment-callback verification failures.
///
/// Signature kinds are a security boundary: they are rejected with no
/// informative body.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// No verification secret configured; fail closed
    #[error("Webhook verification secret is not configured")]
    MissingSecret,

    /// Request carried no signature header
    #[error("Missing signature header")]
    MissingSignature,

    /// Signature did not verify over the raw body
    #[error("Invalid signature")]
    InvalidSignature,

    /// Body failed to parse after signature verification
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Fulfillment threw; returned as 5xx so the provider redelivers
    #[error("Fulfillment failed: {0}")]
    FulfillmentFailed(String),
}

/// Document-store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Conditional write lost to an existing document
    #[error("Document already exists for key: {0}")]
    Conflict(String),

    /// Backend-level failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Payment-provider failures
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Provider API key not configured
    #[error("Payment provider is not configured")]
    NotConfigured,

    /// Session creation call failed
    #[error("Failed to create checkout session: {0}")]
    SessionCreation(String),

    /// Provider returned a response we could not interpret
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for Registrar operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::SessionCreation(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Checkout(e) => {
                let status = e.status_code();
                let message = if e.is_user_facing() {
                    e.to_string()
                } else {
                    tracing::error!(error = %e, "checkout failed (detail withheld from client)");
                    "Checkout failed".to_string()
                };
                (status, Json(json!({ "error": message }))).into_response()
            }
            Error::Webhook(e) => match e {
                WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                    // No informative body across the security boundary.
                    tracing::warn!(error = %e, "webhook rejected");
                    StatusCode::BAD_REQUEST.into_response()
                }
                WebhookError::MissingSecret => {
                    tracing::error!("webhook secret missing; refusing unsigned callback");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
                WebhookError::InvalidPayload(msg) => {
                    tracing::error!(error = %msg, "webhook payload rejected");
                    StatusCode::BAD_REQUEST.into_response()
                }
                WebhookError::FulfillmentFailed(msg) => {
                    // 5xx on purpose: the provider's retry mechanism
                    // redelivers, and the idempotency key makes the
                    // replay safe.
                    tracing::error!(error = %msg, "webhook fulfillment failed");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
            other => {
                tracing::error!(error = %other, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_error_display() {
        let err = CheckoutError::DomainRestricted("school.edu".to_string());
        assert_eq!(
            err.to_string(),
            "Registration is restricted to @school.edu addresses"
        );
    }

    #[test]
    fn test_user_facing_split() {
        assert!(CheckoutError::AlreadyRegistered.is_user_facing());
        assert!(CheckoutError::EventEnded.is_user_facing());
        assert!(!CheckoutError::Misconfigured("bad date".into()).is_user_facing());
        assert!(!CheckoutError::InvalidPrice(f64::NAN).is_user_facing());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CheckoutError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            CheckoutError::AlreadyRegistered.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CheckoutError::CheckoutFailed("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Conflict("cs_123".to_string());
        assert!(err.to_string().contains("cs_123"));
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
