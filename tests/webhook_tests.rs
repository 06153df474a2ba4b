//! Payment-callback integration tests
//!
//! Deliveries are signed the way the provider signs them: HMAC-SHA256
//! over `"{t}.{raw_body}"`, sent in the `stripe-signature` header.
//! The tests assert the fail-closed behaviors, the exactly-once
//! guarantee under redelivery, and the provider-authoritative amount.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use registrar::checkout::CheckoutService;
use registrar::config::AppConfig;
use registrar::error::PaymentError;
use registrar::fulfillment::FulfillmentEngine;
use registrar::handlers::{app_router, AppState};
use registrar::model::{Event, EventDate, EventStatus, TicketTier};
use registrar::notify::{ConfirmationEmail, ContactUpsert, Dispatcher, MailSink};
use registrar::store::{AttendeeRepository, CustomerRepository, EventRepository, MemoryStore};
use registrar::stripe::{CheckoutSessionRef, CreateSessionRequest, PaymentProvider};

const SECRET: &str = "whsec_test123secret456";

struct NullSink;

#[async_trait]
impl MailSink for NullSink {
    async fn upsert_contact(&self, _contact: ContactUpsert) -> anyhow::Result<()> {
        Ok(())
    }
    async fn send_email(&self, _email: ConfirmationEmail) -> anyhow::Result<()> {
        Ok(())
    }
}

struct NullProvider;

#[async_trait]
impl PaymentProvider for NullProvider {
    async fn create_checkout_session(
        &self,
        _request: CreateSessionRequest,
    ) -> Result<CheckoutSessionRef, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

fn build_app_with_config(store: Arc<MemoryStore>, config: AppConfig) -> Router {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(NullSink), None));
    let engine = Arc::new(FulfillmentEngine::new(store.clone(), dispatcher.clone()));
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        Arc::new(NullProvider),
        engine.clone(),
        config.clone(),
    ));
    let state = Arc::new(AppState::new(checkout, engine, store, dispatcher, config));
    app_router(state)
}

fn build_app(store: Arc<MemoryStore>) -> Router {
    build_app_with_config(store, AppConfig::test_config())
}

fn seed_event(store: &MemoryStore) {
    store.put_event(Event {
        id: "evt1".to_string(),
        slug: "evt1-slug".to_string(),
        title: "Rust Workshop".to_string(),
        description: String::new(),
        date: EventDate::Iso("2035-06-01T18:00:00Z".to_string()),
        status: EventStatus::Published,
        email_domain: None,
        tiers: vec![TicketTier {
            id: "standard".to_string(),
            name: "Standard".to_string(),
            price: 20.0,
            includes: vec!["Talks".to_string()],
        }],
        price: None,
        access_link: None,
        locale: None,
        attendee_count: 0,
        total_revenue: 0.0,
    });
}

fn completed_payload(session_id: &str) -> String {
    json!({
        "id": "evt_delivery_1",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "livemode": false,
        "pending_webhooks": 1,
        "data": {
            "object": {
                "id": session_id,
                "amount_total": 2000,
                "currency": "eur",
                "payment_status": "paid",
                "metadata": {
                    "event_id": "evt1",
                    "ticket_id": "standard",
                    "name": "Ada",
                    "surname": "Lovelace",
                    "email": "ada@example.com",
                    "locale": "en"
                }
            }
        }
    })
    .to_string()
}

fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

async fn deliver(app: &Router, payload: &str, header: Option<&str>) -> StatusCode {
    let mut builder = Request::builder().method("POST").uri("/api/webhook");
    if let Some(header) = header {
        builder = builder.header("stripe-signature", header);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(payload.to_string())).unwrap())
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn test_signed_delivery_fulfills_paid_registration() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_1");
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    let status = deliver(&app, &payload, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);

    let attendee = store
        .find_by_session_id("cs_live_1")
        .await
        .unwrap()
        .expect("entitlement written");
    assert_eq!(attendee.email, "ada@example.com");
    // Provider-reported total, converted to major units.
    assert_eq!(attendee.amount_paid, 20.0);
    assert_eq!(attendee.currency, "eur");
    assert_eq!(attendee.ticket_name, "Standard");

    let event = store.get_event("evt1").await.unwrap().unwrap();
    assert_eq!(event.attendee_count, 1);
    assert_eq!(event.total_revenue, 20.0);

    let customer = store.get_customer("ada@example.com").await.unwrap().unwrap();
    assert_eq!(customer.purchase_count, 1);
    assert_eq!(customer.total_spent, 20.0);
}

#[tokio::test]
async fn test_redelivery_collapses_to_one_record() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_dup");
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);
    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);
    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);

    assert_eq!(store.attendee_count(), 1);

    // Side-effect counters ran once, not per delivery.
    let event = store.get_event("evt1").await.unwrap().unwrap();
    assert_eq!(event.attendee_count, 1);
    assert_eq!(event.total_revenue, 20.0);
}

#[tokio::test]
async fn test_tampered_body_rejected_without_fulfillment() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_2");
    let header = sign(&payload, SECRET, Utc::now().timestamp());
    let tampered = payload.replace("\"amount_total\":2000", "\"amount_total\":1");

    let status = deliver(&app, &tampered, Some(&header)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_3");
    let header = sign(&payload, "whsec_other_secret", Utc::now().timestamp());

    assert_eq!(
        deliver(&app, &payload, Some(&header)).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_4");
    assert_eq!(deliver(&app, &payload, None).await, StatusCode::BAD_REQUEST);
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_5");
    let stale = Utc::now().timestamp() - 3600;
    let header = sign(&payload, SECRET, stale);

    assert_eq!(
        deliver(&app, &payload, Some(&header)).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_unconfigured_secret_fails_closed() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let mut config = AppConfig::test_config();
    config.stripe_webhook_secret = None;
    let app = build_app_with_config(store.clone(), config);

    let payload = completed_payload("cs_live_6");
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    assert_eq!(
        deliver(&app, &payload, Some(&header)).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_malformed_metadata_acknowledged_without_fulfillment() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    // Extra metadata key the service never wrote. Redelivering the same
    // body can never succeed, so the delivery is acknowledged; only the
    // entitlement write must not happen.
    let payload = completed_payload("cs_live_7").replace(
        "\"locale\":\"en\"",
        "\"locale\":\"en\",\"injected\":\"x\"",
    );
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_unparseable_signed_body_acknowledged() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = "not json at all";
    let header = sign(payload, SECRET, Utc::now().timestamp());

    assert_eq!(deliver(&app, payload, Some(&header)).await, StatusCode::OK);
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_non_fulfillment_events_acknowledged() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    for event_type in [
        "charge.refunded",
        "checkout.session.async_payment_failed",
        "customer.subscription.created",
    ] {
        let payload = json!({
            "id": "evt_other",
            "type": event_type,
            "created": Utc::now().timestamp(),
            "data": { "object": {} }
        })
        .to_string();
        let header = sign(&payload, SECRET, Utc::now().timestamp());

        assert_eq!(
            deliver(&app, &payload, Some(&header)).await,
            StatusCode::OK,
            "{event_type} should be acknowledged"
        );
    }

    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_fulfillment_failure_returns_5xx_for_redelivery() {
    // Event missing from the store: signature verifies, fulfillment
    // cannot write the denormalized record.
    let store = Arc::new(MemoryStore::new());
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_8");
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    assert_eq!(
        deliver(&app, &payload, Some(&header)).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(store.attendee_count(), 0);
}

#[tokio::test]
async fn test_second_v1_candidate_accepted() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    let payload = completed_payload("cs_live_9");
    let timestamp = Utc::now().timestamp();
    let good = sign(&payload, SECRET, timestamp);
    let good_sig = good.split("v1=").nth(1).unwrap();
    let header = format!("t={timestamp},v1={},v1={good_sig}", "0".repeat(64));

    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);
    assert_eq!(store.attendee_count(), 1);
}

#[tokio::test]
async fn test_amount_comes_from_provider_not_metadata() {
    let store = Arc::new(MemoryStore::new());
    seed_event(&store);
    let app = build_app(store.clone());

    // A discounted charge: provider says 10.00 even though the tier
    // lists 20.00. The record follows the money.
    let payload =
        completed_payload("cs_live_10").replace("\"amount_total\":2000", "\"amount_total\":1000");
    let header = sign(&payload, SECRET, Utc::now().timestamp());

    assert_eq!(deliver(&app, &payload, Some(&header)).await, StatusCode::OK);

    let attendee = store
        .find_by_session_id("cs_live_10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attendee.amount_paid, 10.0);

    let event = store.get_event("evt1").await.unwrap().unwrap();
    assert_eq!(event.total_revenue, 10.0);
}
