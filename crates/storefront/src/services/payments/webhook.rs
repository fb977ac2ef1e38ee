//! Stripe webhook verification and handling.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where each `v1` is
//! `HMAC-SHA256(secret, "<t>.<raw body>")`. A delivery is accepted when any
//! `v1` matches and `t` is within the tolerance window.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use threadline_core::OrderId;

use crate::db::{OrderStore, RepositoryError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default maximum age of a delivery, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Event type that confirms a card payment.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Reasons a webhook delivery is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing Stripe-Signature header")]
    MissingSignature,
    #[error("invalid Stripe-Signature header")]
    InvalidSignatureHeader,
    #[error("webhook signature mismatch")]
    SignatureMismatch,
    #[error("webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
}

/// A webhook event. Only the fields this shop reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Event payload wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The order id stored in the event object's `metadata.order_id`.
    ///
    /// Stripe returns metadata values as strings, but numbers are accepted too.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        let raw = self.data.object.get("metadata")?.get("order_id")?;
        match raw {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()).map(OrderId::new),
            _ => None,
        }
    }
}

/// What handling a verified event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order was marked paid.
    OrderPaid(OrderId),
    /// The event named an order that does not exist; nothing changed.
    UnknownOrder(OrderId),
    /// A success event without a usable order id.
    MissingOrderId,
    /// An event type this shop does not act on.
    Ignored(String),
}

/// Parsed `Stripe-Signature` header.
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader<'_>, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(
                t.parse::<i64>()
                    .map_err(|_| WebhookError::InvalidSignatureHeader)?,
            );
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(WebhookError::InvalidSignatureHeader),
    }
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verify a delivery's signature header against the shared secret.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns a [`WebhookError`] if the header is malformed, no signature
/// matches, or the timestamp is older or newer than `tolerance_secs`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let parsed = parse_signature_header(header)?;

    let matched = parsed.signatures.iter().any(|sig| {
        let Ok(expected) = hex::decode(sig) else {
            return false;
        };
        mac_for(secret, parsed.timestamp, payload)
            .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    if now.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    Ok(())
}

/// Build a `Stripe-Signature` header value for a payload.
///
/// Used to sign test deliveries and local replays.
///
/// # Errors
///
/// Returns `WebhookError::SignatureMismatch` if the secret cannot key an HMAC.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a delivery and parse its event.
///
/// # Errors
///
/// Returns a [`WebhookError`] for signature problems or a body that is not a
/// well-formed event.
pub fn construct_event(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<WebhookEvent, WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    verify_signature(payload, header, secret, tolerance_secs, now)?;
    serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}

/// Apply a verified event to the order store.
///
/// Only `payment_intent.succeeded` changes anything: it flips the referenced
/// order to paid. Unknown orders are reported in the outcome, not as errors.
///
/// # Errors
///
/// Returns `RepositoryError` if the store update fails.
pub async fn apply_event<S: OrderStore>(
    orders: &S,
    event: &WebhookEvent,
) -> Result<WebhookOutcome, RepositoryError> {
    if event.event_type != PAYMENT_SUCCEEDED {
        return Ok(WebhookOutcome::Ignored(event.event_type.clone()));
    }

    let Some(order_id) = event.order_id() else {
        return Ok(WebhookOutcome::MissingOrderId);
    };

    if orders.mark_paid(order_id).await? {
        Ok(WebhookOutcome::OrderPaid(order_id))
    } else {
        Ok(WebhookOutcome::UnknownOrder(order_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_k3yF0rT3st1ng";
    const NOW: i64 = 1_760_000_000;

    fn payload(order_id: &str) -> Vec<u8> {
        format!(
            r#"{{"id":"evt_1","type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_1","metadata":{{"order_id":"{order_id}"}}}}}}}}"#
        )
        .into_bytes()
    }

    #[test]
    fn test_sign_then_verify() {
        let body = payload("12");
        let header = sign(&body, SECRET, NOW).unwrap();
        assert_eq!(verify_signature(&body, &header, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = payload("12");
        let header = sign(&body, "whsec_other", NOW).unwrap();
        assert_eq!(
            verify_signature(&body, &header, SECRET, 300, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(&payload("12"), SECRET, NOW).unwrap();
        assert_eq!(
            verify_signature(&payload("13"), &header, SECRET, 300, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = payload("12");
        let good = sign(&body, SECRET, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v1={good_sig},v0=ignored");
        assert_eq!(verify_signature(&body, &header, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = payload("12");
        let header = sign(&body, SECRET, NOW - 301).unwrap();
        assert_eq!(
            verify_signature(&body, &header, SECRET, 300, NOW),
            Err(WebhookError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_out_of_tolerance() {
        let body = payload("12");
        for signed_at in [i64::MIN, i64::MAX] {
            let header = sign(&body, SECRET, signed_at).unwrap();
            assert_eq!(
                verify_signature(&body, &header, SECRET, 300, NOW),
                Err(WebhookError::TimestampOutOfTolerance)
            );
        }
    }

    #[test]
    fn test_header_parse_errors() {
        let body = payload("12");
        for header in ["", "t=abc,v1=00", "v1=00", "t=123"] {
            assert_eq!(
                verify_signature(&body, header, SECRET, 300, NOW),
                Err(WebhookError::InvalidSignatureHeader),
                "header {header:?}"
            );
        }
    }

    #[test]
    fn test_construct_event_requires_header() {
        assert_eq!(
            construct_event(&payload("1"), None, SECRET, 300, NOW).unwrap_err(),
            WebhookError::MissingSignature
        );
    }

    #[test]
    fn test_construct_event_malformed_body() {
        let body = b"not json".to_vec();
        let header = sign(&body, SECRET, NOW).unwrap();
        assert!(matches!(
            construct_event(&body, Some(&header), SECRET, 300, NOW),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_order_id_from_metadata() {
        let body = payload("42");
        let header = sign(&body, SECRET, NOW).unwrap();
        let event = construct_event(&body, Some(&header), SECRET, 300, NOW).unwrap();
        assert_eq!(event.event_type, PAYMENT_SUCCEEDED);
        assert_eq!(event.order_id(), Some(OrderId::new(42)));
    }

    #[test]
    fn test_order_id_numeric_and_missing() {
        let numeric: WebhookEvent = serde_json::from_str(
            r#"{"id":"evt","type":"x","data":{"object":{"metadata":{"order_id":7}}}}"#,
        )
        .unwrap();
        assert_eq!(numeric.order_id(), Some(OrderId::new(7)));

        let missing: WebhookEvent =
            serde_json::from_str(r#"{"id":"evt","type":"x","data":{"object":{}}}"#).unwrap();
        assert_eq!(missing.order_id(), None);
    }
}
