//! Payment processor webhook receiver.
//!
//! Stripe retries deliveries that do not get a 2xx, so only signature and
//! payload problems are answered with 400; events this shop does not act on
//! are acknowledged with 200.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::error::AppError;
use crate::services::payments::webhook::{self, SIGNATURE_HEADER, WebhookOutcome};
use crate::state::AppState;

/// `POST /stripe/webhook`
#[instrument(skip_all, fields(event_id, event_type))]
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let stripe = &state.config().stripe;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = match webhook::construct_event(
        &body,
        signature,
        stripe.webhook_secret.expose_secret(),
        stripe.webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    ) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected webhook delivery");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let span = tracing::Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.event_type.as_str());

    match webhook::apply_event(&state.orders(), &event).await {
        Ok(WebhookOutcome::OrderPaid(order_id)) => {
            tracing::info!(%order_id, "Order marked paid");
        }
        Ok(WebhookOutcome::UnknownOrder(order_id)) => {
            tracing::info!(%order_id, "Payment succeeded for unknown order");
        }
        Ok(WebhookOutcome::MissingOrderId) => {
            tracing::info!("Payment succeeded without an order id in metadata");
        }
        Ok(WebhookOutcome::Ignored(kind)) => {
            tracing::debug!(event_type = %kind, "Ignoring webhook event");
        }
        // 500 so Stripe redelivers once the database is back
        Err(e) => return AppError::Database(e).into_response(),
    }

    StatusCode::OK.into_response()
}
