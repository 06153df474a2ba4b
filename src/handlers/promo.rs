//! Promo code validation endpoint.
//!
//! `POST /api/promo/validate` is a read-only display aid: it tells the
//! form whether a code applies and what the discounted price would
//! show as. It never feeds the resolver; the authoritative charge
//! amount is unaffected by anything returned here.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Error;
use crate::handlers::AppState;

/// Body for `POST /api/promo/validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    /// Code as entered by the buyer
    pub code: String,
    /// Event the buyer is registering for
    pub event_id: String,
    /// Displayed price the discount would apply to
    pub price: f64,
}

/// Response for `POST /api/promo/validate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoResponse {
    /// Whether the code applies to this event right now
    pub valid: bool,
    /// Display price after the discount, present only when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
}

impl ValidatePromoResponse {
    fn invalid() -> Self {
        Self {
            valid: false,
            discounted_price: None,
        }
    }
}

/// Validate a promo code for display purposes.
///
/// # Route
/// `POST /api/promo/validate`
#[instrument(skip_all, fields(event_id = %request.event_id))]
pub async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidatePromoRequest>,
) -> Result<Json<ValidatePromoResponse>, Error> {
    let code = request.code.trim();
    if code.is_empty() {
        return Ok(Json(ValidatePromoResponse::invalid()));
    }

    let Some(promo) = state.store.get_promo(code).await? else {
        debug!(code, "unknown promo code");
        return Ok(Json(ValidatePromoResponse::invalid()));
    };

    if !promo.is_valid_for(&request.event_id, Utc::now()) {
        return Ok(Json(ValidatePromoResponse::invalid()));
    }

    Ok(Json(ValidatePromoResponse {
        valid: true,
        discounted_price: Some(promo.discounted(request.price)),
    }))
}
