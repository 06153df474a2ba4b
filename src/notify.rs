//! Notification dispatch.
//!
//! Best-effort delivery of the confirmation email and the contact-list
//! registration. Nothing here is allowed to fail the caller: the
//! entitlement record is already durably written by the time dispatch
//! runs, so every failure is logged with enough context to resend by
//! hand and then swallowed.
//!
//! The two sub-steps (contact upsert, confirmation email) run
//! independently; one failing does not block the other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AppConfig;

const BREVO_API_BASE: &str = "https://api.brevo.com/v3";

/// Contact-list upsert payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContactUpsert {
    /// Recipient address
    pub email: String,
    /// Contact attributes (name, last event, ...)
    pub attributes: serde_json::Value,
    /// List ids to attach the contact to
    #[serde(rename = "listIds", skip_serializing_if = "Vec::is_empty")]
    pub list_ids: Vec<i64>,
    /// Update the contact if it already exists
    #[serde(rename = "updateEnabled")]
    pub update_enabled: bool,
}

/// A rendered confirmation email.
#[derive(Debug, Clone)]
pub struct ConfirmationEmail {
    /// Recipient address
    pub to_email: String,
    /// Recipient display name
    pub to_name: String,
    /// Localized subject line
    pub subject: String,
    /// HTML body
    pub html_body: String,
}

/// Display fields needed to render a confirmation.
#[derive(Debug, Clone)]
pub struct EventDisplay {
    /// Event id, for contact attributes
    pub event_id: String,
    /// Event title
    pub title: String,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Access link included in the email, if any
    pub access_link: Option<String>,
    /// Resolved tier name
    pub tier_name: String,
    /// Buyer locale tag
    pub locale: String,
}

/// External contact-list and transactional-email sink.
#[async_trait]
pub trait MailSink: Send + Sync {
    /// Register or update the recipient in the contact list.
    async fn upsert_contact(&self, contact: ContactUpsert) -> anyhow::Result<()>;

    /// Send a transactional email.
    async fn send_email(&self, email: ConfirmationEmail) -> anyhow::Result<()>;
}

/// Brevo REST implementation of [`MailSink`].
///
/// Degrades to a logged skip when no API key is configured; the free
/// registration path must still succeed on an unconfigured instance.
pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
}

impl BrevoMailer {
    /// Build a mailer from configuration.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.brevo_api_key.clone(),
            api_base: BREVO_API_BASE.to_string(),
        }
    }

    /// Point the mailer at a different API base (test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl MailSink for BrevoMailer {
    async fn upsert_contact(&self, contact: ContactUpsert) -> anyhow::Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(email = %contact.email, "mail provider unconfigured; skipping contact upsert");
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/contacts", self.api_base))
            .header("api-key", api_key)
            .json(&contact)
            .send()
            .await?;

        let status = response.status();
        // 400 "duplicate" responses are expected when updateEnabled
        // races; anything else non-2xx is a real failure.
        if !status.is_success() && status.as_u16() != 400 {
            anyhow::bail!("contact upsert returned {status}");
        }
        Ok(())
    }

    async fn send_email(&self, email: ConfirmationEmail) -> anyhow::Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(email = %email.to_email, "mail provider unconfigured; skipping confirmation email");
            return Ok(());
        };

        let payload = serde_json::json!({
            "sender": { "name": "Registrar", "email": "noreply@registrar.app" },
            "to": [{ "email": email.to_email, "name": email.to_name }],
            "subject": email.subject,
            "htmlContent": email.html_body,
        });

        let response = self
            .http
            .post(format!("{}/smtp/email", self.api_base))
            .header("api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("email send returned {status}");
        }
        Ok(())
    }
}

/// Outcome of one dispatch, for bulk bookkeeping. Informational only;
/// no caller treats it as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Contact upsert succeeded
    pub contact_ok: bool,
    /// Confirmation email succeeded
    pub email_ok: bool,
}

/// Best-effort notification dispatcher.
pub struct Dispatcher {
    sink: Arc<dyn MailSink>,
    list_ids: Vec<i64>,
}

impl Dispatcher {
    /// Create a dispatcher over the given sink.
    pub fn new(sink: Arc<dyn MailSink>, list_id: Option<i64>) -> Self {
        Self {
            sink,
            list_ids: list_id.into_iter().collect(),
        }
    }

    /// Register the recipient and send the localized confirmation.
    ///
    /// Never fails: each sub-step's error is logged with the recipient
    /// and event ids so it can be replayed manually.
    pub async fn notify(&self, recipient_name: &str, email: &str, event: &EventDisplay) -> DispatchOutcome {
        let contact = ContactUpsert {
            email: email.to_string(),
            attributes: serde_json::json!({
                "FIRSTNAME": recipient_name,
                "LAST_EVENT_ID": event.event_id,
                "LAST_EVENT": event.title,
            }),
            list_ids: self.list_ids.clone(),
            update_enabled: true,
        };

        let contact_ok = match self.sink.upsert_contact(contact).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    email = %email,
                    event_id = %event.event_id,
                    error = %e,
                    "contact upsert failed"
                );
                false
            }
        };

        let rendered = render_confirmation(recipient_name, email, event);
        let email_ok = match self.sink.send_email(rendered).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    email = %email,
                    event_id = %event.event_id,
                    error = %e,
                    "confirmation email failed"
                );
                false
            }
        };

        DispatchOutcome {
            contact_ok,
            email_ok,
        }
    }
}

/// Render the localized confirmation email.
///
/// Everything interpolated into the HTML body is escaped here; names
/// are also bounded upstream, but titles and tier names come straight
/// from the event document.
fn render_confirmation(name: &str, email: &str, event: &EventDisplay) -> ConfirmationEmail {
    let date = format_event_date(event.starts_at, &event.locale);
    let name_html = htmlescape::encode_minimal(name);
    let title_html = htmlescape::encode_minimal(&event.title);
    let tier_html = htmlescape::encode_minimal(&event.tier_name);

    let (subject, greeting, date_label, ticket_label, link_label) =
        if event.locale.starts_with("it") {
            (
                format!("Iscrizione confermata: {}", event.title),
                format!("Ciao {name_html},"),
                "Data",
                "Biglietto",
                "Link di accesso",
            )
        } else {
            (
                format!("Registration confirmed: {}", event.title),
                format!("Hi {name_html},"),
                "Date",
                "Ticket",
                "Access link",
            )
        };

    let mut body = format!(
        "<p>{greeting}</p>\
         <p><strong>{title_html}</strong></p>\
         <p>{date_label}: {date}<br>{ticket_label}: {tier_html}</p>",
    );
    if let Some(link) = &event.access_link {
        body.push_str(&format!(
            "<p>{link_label}: <a href=\"{link}\">{link}</a></p>"
        ));
    }

    ConfirmationEmail {
        to_email: email.to_string(),
        to_name: name.to_string(),
        subject,
        html_body: body,
    }
}

/// Format the event instant for the buyer's locale.
fn format_event_date(at: DateTime<Utc>, locale: &str) -> String {
    if locale.starts_with("it") {
        at.format("%d/%m/%Y alle %H:%M UTC").to_string()
    } else {
        at.format("%B %e, %Y at %H:%M UTC").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct RecordingSink {
        contacts: Mutex<Vec<ContactUpsert>>,
        emails: Mutex<Vec<ConfirmationEmail>>,
        fail_contact: bool,
        fail_email: bool,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                contacts: Mutex::new(Vec::new()),
                emails: Mutex::new(Vec::new()),
                fail_contact: false,
                fail_email: false,
            }
        }
    }

    #[async_trait]
    impl MailSink for RecordingSink {
        async fn upsert_contact(&self, contact: ContactUpsert) -> anyhow::Result<()> {
            if self.fail_contact {
                anyhow::bail!("simulated contact failure");
            }
            self.contacts.lock().unwrap().push(contact);
            Ok(())
        }

        async fn send_email(&self, email: ConfirmationEmail) -> anyhow::Result<()> {
            if self.fail_email {
                anyhow::bail!("simulated email failure");
            }
            self.emails.lock().unwrap().push(email);
            Ok(())
        }
    }

    fn display() -> EventDisplay {
        EventDisplay {
            event_id: "evt1".to_string(),
            title: "Rust Workshop".to_string(),
            starts_at: Utc.with_ymd_and_hms(2030, 6, 1, 18, 0, 0).unwrap(),
            access_link: Some("https://meet.example.com/abc".to_string()),
            tier_name: "Standard".to_string(),
            locale: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notify_sends_both() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(sink.clone(), Some(7));

        let outcome = dispatcher.notify("Ada", "ada@example.com", &display()).await;

        assert_eq!(
            outcome,
            DispatchOutcome {
                contact_ok: true,
                email_ok: true
            }
        );
        assert_eq!(sink.contacts.lock().unwrap().len(), 1);
        let emails = sink.emails.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert!(emails[0].subject.contains("Rust Workshop"));
        assert!(emails[0].html_body.contains("meet.example.com"));
    }

    #[tokio::test]
    async fn test_contact_failure_does_not_block_email() {
        let sink = Arc::new(RecordingSink {
            fail_contact: true,
            ..RecordingSink::new()
        });
        let dispatcher = Dispatcher::new(sink.clone(), None);

        let outcome = dispatcher.notify("Ada", "ada@example.com", &display()).await;

        assert!(!outcome.contact_ok);
        assert!(outcome.email_ok);
        assert_eq!(sink.emails.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_email_failure_reported_not_raised() {
        let sink = Arc::new(RecordingSink {
            fail_email: true,
            ..RecordingSink::new()
        });
        let dispatcher = Dispatcher::new(sink.clone(), None);

        let outcome = dispatcher.notify("Ada", "ada@example.com", &display()).await;

        assert!(outcome.contact_ok);
        assert!(!outcome.email_ok);
    }

    #[test]
    fn test_localized_rendering() {
        let mut event = display();
        event.locale = "it".to_string();

        let email = render_confirmation("Ada", "ada@example.com", &event);
        assert!(email.subject.starts_with("Iscrizione confermata"));
        assert!(email.html_body.contains("01/06/2030"));

        let event_en = display();
        let email_en = render_confirmation("Ada", "ada@example.com", &event_en);
        assert!(email_en.subject.starts_with("Registration confirmed"));
        assert!(email_en.html_body.contains("June"));
    }

    #[test]
    fn test_rendered_body_escapes_markup() {
        let mut event = display();
        event.title = "Rust & <Friends>".to_string();

        let email = render_confirmation("A&a", "a@b.com", &event);
        assert!(email.html_body.contains("Rust &amp; &lt;Friends&gt;"));
        assert!(email.html_body.contains("Hi A&amp;a,"));
        assert!(!email.html_body.contains("<Friends>"));
    }
}
