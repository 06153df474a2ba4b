//! Application configuration
//!
//! All secrets come from the environment. The paid path requires the
//! Stripe keys and the base URL; the free path degrades gracefully only
//! in the email step when the mail provider is unconfigured.
//!
//! Secrets are never logged and never included in `Debug` output.

use std::time::Duration;

/// Environment variable holding the Stripe API secret key
pub const ENV_STRIPE_SECRET_KEY: &str = "STRIPE_SECRET_KEY";
/// Environment variable holding the webhook signing secret
pub const ENV_STRIPE_WEBHOOK_SECRET: &str = "STRIPE_WEBHOOK_SECRET";
/// Environment variable holding the public base URL of this application
pub const ENV_APP_BASE_URL: &str = "APP_BASE_URL";
/// Environment variable holding the transactional-email API key
pub const ENV_BREVO_API_KEY: &str = "BREVO_API_KEY";
/// Environment variable holding the contact-list id
pub const ENV_BREVO_LIST_ID: &str = "BREVO_LIST_ID";

/// Runtime configuration loaded from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Stripe API secret key (`sk_...`); required for the paid path
    pub stripe_secret_key: Option<String>,
    /// Webhook signing secret (`whsec_...`); the callback endpoint
    /// fails closed without it
    pub stripe_webhook_secret: Option<String>,
    /// Absolute base URL used to build success/cancel redirect URLs
    pub base_url: String,
    /// Transactional-email API key; email step logs-and-skips if absent
    pub brevo_api_key: Option<String>,
    /// Contact-list id for registration upserts
    pub brevo_list_id: Option<i64>,
    /// How long a created checkout session remains payable
    pub session_expiry: Duration,
    /// Accepted clock skew on webhook signature timestamps
    pub signature_tolerance: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("stripe_secret_key", &self.stripe_secret_key.as_deref().map(|_| "***"))
            .field(
                "stripe_webhook_secret",
                &self.stripe_webhook_secret.as_deref().map(|_| "***"),
            )
            .field("base_url", &self.base_url)
            .field("brevo_api_key", &self.brevo_api_key.as_deref().map(|_| "***"))
            .field("brevo_list_id", &self.brevo_list_id)
            .field("session_expiry", &self.session_expiry)
            .field("signature_tolerance", &self.signature_tolerance)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// Missing values are tolerated here; each subsystem decides how a
    /// missing value degrades (the webhook verifier fails closed, the
    /// mailer logs and skips).
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            stripe_secret_key: read(ENV_STRIPE_SECRET_KEY),
            stripe_webhook_secret: read(ENV_STRIPE_WEBHOOK_SECRET),
            base_url: read(ENV_APP_BASE_URL)
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            brevo_api_key: read(ENV_BREVO_API_KEY),
            brevo_list_id: read(ENV_BREVO_LIST_ID).and_then(|v| v.parse().ok()),
            session_expiry: Duration::from_secs(30 * 60),
            signature_tolerance: Duration::from_secs(5 * 60),
        }
    }

    /// Configuration for tests: everything present, short expiries.
    pub fn test_config() -> Self {
        Self {
            stripe_secret_key: Some("sk_test_123".to_string()),
            stripe_webhook_secret: Some("whsec_test123secret456".to_string()),
            base_url: "https://app.example.com".to_string(),
            brevo_api_key: Some("brevo_test_key".to_string()),
            brevo_list_id: Some(7),
            session_expiry: Duration::from_secs(30 * 60),
            signature_tolerance: Duration::from_secs(5 * 60),
        }
    }

    /// URL the payment provider redirects to after successful payment.
    pub fn success_url(&self) -> String {
        format!("{}/thank-you", self.base_url.trim_end_matches('/'))
    }

    /// URL the payment provider redirects to on cancel.
    pub fn cancel_url(&self, event_slug: &str) -> String {
        format!("{}/events/{}", self.base_url.trim_end_matches('/'), event_slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls() {
        let config = AppConfig::test_config();
        assert_eq!(config.success_url(), "https://app.example.com/thank-you");
        assert_eq!(
            config.cancel_url("rust-101"),
            "https://app.example.com/events/rust-101"
        );
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let mut config = AppConfig::test_config();
        config.base_url = "https://app.example.com/".to_string();
        assert_eq!(config.success_url(), "https://app.example.com/thank-you");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::test_config();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_123"));
        assert!(!debug.contains("whsec_test123secret456"));
    }
}
