//! Webhook signature verification.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{t}.{raw_body}"`
//! and sends the result in the `stripe-signature` header as
//! `t=<unix>,v1=<hex>[,v1=<hex>...]`. Verification runs against the
//! raw, unparsed body; the comparison is constant-time via
//! `Mac::verify_slice`. The timestamp is bounded by a tolerance window
//! to limit replay of captured deliveries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `stripe-signature` headers against a configured secret.
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

/// Parsed pieces of a `stripe-signature` header.
struct SignatureHeader {
    timestamp: i64,
    /// All `v1=` candidates; any one verifying is sufficient.
    candidates: Vec<String>,
}

impl SignatureVerifier {
    /// Create a verifier with the given signing secret and timestamp
    /// tolerance.
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify `header` against `payload` at instant `now`.
    ///
    /// Returns `Ok(())` only if a `v1` candidate matches the expected
    /// HMAC and the signed timestamp is within tolerance.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let parsed = parse_header(header)?;

        let age = (now.timestamp() - parsed.timestamp).unsigned_abs();
        if age > self.tolerance.as_secs() {
            return Err(WebhookError::InvalidSignature);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        for candidate in &parsed.candidates {
            let Ok(bytes) = hex::decode(candidate) else {
                continue;
            };
            // verify_slice is constant-time
            if mac.clone().verify_slice(&bytes).is_ok() {
                return Ok(());
            }
        }

        Err(WebhookError::InvalidSignature)
    }
}

fn parse_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<i64>().ok();
            }
            Some(("v1", value)) => {
                candidates.push(value.to_string());
            }
            // Older scheme versions (v0) and unknown keys are ignored.
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::InvalidSignature)?;
    if candidates.is_empty() {
        return Err(WebhookError::InvalidSignature);
    }

    Ok(SignatureHeader {
        timestamp,
        candidates,
    })
}
