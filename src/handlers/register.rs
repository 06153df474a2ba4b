//! Registration endpoint.
//!
//! `POST /api/checkout` takes the registration form body and returns a
//! redirect URL: the hosted payment page for paid tiers, the success
//! page for free ones. All failures map through `Error::into_response`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{info, instrument};

use crate::checkout::{RegistrationOutcome, RegistrationRequest};
use crate::error::Error;
use crate::handlers::AppState;

/// Success body for `POST /api/checkout`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    /// Where the caller should send the buyer next
    pub url: String,
}

/// Handle a registration form submission.
///
/// # Route
/// `POST /api/checkout`
#[instrument(skip_all, fields(event_id = %request.event_id))]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<CheckoutResponse>, Error> {
    let started = Instant::now();
    let outcome = state.checkout.register(request).await?;
    state.metrics.record_latency(started.elapsed());

    let url = match outcome {
        RegistrationOutcome::Fulfilled { url } => {
            state.metrics.record_registration();
            info!("free registration fulfilled");
            url
        }
        RegistrationOutcome::Redirect { url } => {
            info!("redirecting to hosted payment page");
            url
        }
    };

    Ok(Json(CheckoutResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let body = serde_json::to_value(CheckoutResponse {
            url: "https://checkout.stripe.com/cs_1".to_string(),
        })
        .unwrap();
        assert_eq!(body["url"], "https://checkout.stripe.com/cs_1");
    }
}
