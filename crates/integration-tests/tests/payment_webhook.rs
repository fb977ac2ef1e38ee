//! Webhook handling: signed events flip card orders to paid.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use threadline_core::{CurrencyCode, OrderId, VariantId};
use threadline_integration_tests::{FakeGateway, MemoryCatalog, MemoryOrders};
use threadline_storefront::config::{SentryConfig, ShopConfig, StripeConfig};
use threadline_storefront::models::NewOrder;
use threadline_storefront::routes;
use threadline_storefront::services::cart::Cart;
use threadline_storefront::services::checkout::{self, CheckoutForm};
use threadline_storefront::services::payments::webhook::{
    self, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookError, WebhookOutcome,
};
use threadline_storefront::state::AppState;

const SECRET: &str = "whsec_k3Jd9fQm2LxVb8TzR4pWn7Yc";
const NOW: i64 = 1_760_000_000;

fn succeeded(order_id: &str) -> Vec<u8> {
    format!(
        r#"{{"id":"evt_1","type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_test_1","metadata":{{"order_id":"{order_id}"}}}}}}}}"#
    )
    .into_bytes()
}

fn deliver(payload: &[u8], signed_at: i64) -> Result<webhook::WebhookEvent, WebhookError> {
    let header = webhook::sign(payload, SECRET, signed_at).unwrap();
    webhook::construct_event(payload, Some(header.as_str()), SECRET, DEFAULT_TOLERANCE_SECS, NOW)
}

async fn card_order(orders: &MemoryOrders) -> OrderId {
    let catalog = MemoryCatalog::new();
    catalog.insert(1, "Linen Shirt", "M", 4_900);
    let mut cart = Cart::new();
    cart.add_checked(&catalog, VariantId::new(1), 1).await.unwrap();

    let order: NewOrder = checkout::validate(&CheckoutForm {
        name: Some("Asha Rao".to_string()),
        mobile: Some("9845012345".to_string()),
        address: Some("12 MG Road".to_string()),
        payment_method: Some("CARD".to_string()),
        ..CheckoutForm::default()
    })
    .unwrap();

    checkout::place_order(
        &catalog,
        orders,
        &FakeGateway::new(),
        &mut cart,
        order,
        CurrencyCode::USD,
    )
    .await
    .unwrap()
    .order()
    .id
}

// =============================================================================
// Service level
// =============================================================================

#[tokio::test]
async fn test_succeeded_event_marks_order_paid() {
    let orders = MemoryOrders::new();
    let id = card_order(&orders).await;
    assert!(!orders.get(id).unwrap().order.paid);

    let event = deliver(&succeeded(&id.to_string()), NOW).unwrap();
    let outcome = webhook::apply_event(&orders, &event).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::OrderPaid(id));
    assert!(orders.get(id).unwrap().order.paid);
}

#[tokio::test]
async fn test_redelivery_is_harmless() {
    let orders = MemoryOrders::new();
    let id = card_order(&orders).await;
    let event = deliver(&succeeded(&id.to_string()), NOW).unwrap();

    webhook::apply_event(&orders, &event).await.unwrap();
    let again = webhook::apply_event(&orders, &event).await.unwrap();

    assert_eq!(again, WebhookOutcome::OrderPaid(id));
    assert!(orders.get(id).unwrap().order.paid);
}

#[tokio::test]
async fn test_unknown_order_changes_nothing() {
    let orders = MemoryOrders::new();
    let id = card_order(&orders).await;

    let event = deliver(&succeeded("4040"), NOW).unwrap();
    let outcome = webhook::apply_event(&orders, &event).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::UnknownOrder(OrderId::new(4040)));
    assert!(!orders.get(id).unwrap().order.paid);
}

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let orders = MemoryOrders::new();
    let id = card_order(&orders).await;
    let payload = format!(
        r#"{{"id":"evt_2","type":"payment_intent.payment_failed","data":{{"object":{{"metadata":{{"order_id":"{id}"}}}}}}}}"#
    );

    let event = deliver(payload.as_bytes(), NOW).unwrap();
    let outcome = webhook::apply_event(&orders, &event).await.unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Ignored("payment_intent.payment_failed".to_string())
    );
    assert!(!orders.get(id).unwrap().order.paid);
}

#[test]
fn test_bad_signature_and_stale_timestamp_rejected() {
    let payload = succeeded("1");

    let forged = webhook::sign(&payload, "whsec_someone_else_entirely", NOW).unwrap();
    assert_eq!(
        webhook::construct_event(&payload, Some(forged.as_str()), SECRET, DEFAULT_TOLERANCE_SECS, NOW)
            .unwrap_err(),
        WebhookError::SignatureMismatch
    );

    assert_eq!(
        deliver(&payload, NOW - DEFAULT_TOLERANCE_SECS - 1).unwrap_err(),
        WebhookError::TimestampOutOfTolerance
    );

    assert_eq!(
        webhook::construct_event(&payload, None, SECRET, DEFAULT_TOLERANCE_SECS, NOW)
            .unwrap_err(),
        WebhookError::MissingSignature
    );
}

// =============================================================================
// HTTP level
// =============================================================================

/// App state whose pool never connects; the webhook rejects bad deliveries
/// before touching the database.
fn lazy_state() -> AppState {
    let config = ShopConfig {
        database_url: SecretString::from("postgres://localhost:1/threadline"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        currency: CurrencyCode::USD,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_9Xq2Lm4Rt7Vb1Nc8Wd3Kp6Ys"),
            publishable_key: "pk_test_abc".to_string(),
            webhook_secret: SecretString::from(SECRET),
            api_base: "http://localhost:1".to_string(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        },
        sentry: SentryConfig::default(),
    };
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(100))
        .connect_lazy("postgres://localhost:1/threadline")
        .unwrap();
    AppState::new(config, pool).unwrap()
}

async fn post_webhook(signature: Option<&str>, body: Vec<u8>) -> StatusCode {
    let app = routes::routes().with_state(lazy_state());
    let mut request = Request::post("/stripe/webhook");
    if let Some(sig) = signature {
        request = request.header(SIGNATURE_HEADER, sig);
    }
    app.oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_unsigned_delivery_is_rejected() {
    assert_eq!(post_webhook(None, succeeded("1")).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forged_delivery_is_rejected() {
    let payload = succeeded("1");
    let now = chrono::Utc::now().timestamp();
    let forged = webhook::sign(&payload, "whsec_someone_else_entirely", now).unwrap();

    assert_eq!(
        post_webhook(Some(forged.as_str()), payload).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_signed_unrelated_event_is_acknowledged() {
    let payload = br#"{"id":"evt_3","type":"charge.refunded","data":{"object":{}}}"#.to_vec();
    let now = chrono::Utc::now().timestamp();
    let header = webhook::sign(&payload, SECRET, now).unwrap();

    assert_eq!(post_webhook(Some(header.as_str()), payload).await, StatusCode::OK);
}
