//! Stripe REST client (payment intents only).

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use threadline_core::{CurrencyCode, OrderId};

use super::{PaymentError, PaymentGateway, PaymentIntent};
use crate::config::StripeConfig;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

impl PaymentGateway for StripeClient {
    #[tracing::instrument(skip(self))]
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        order_id: OrderId,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount_minor.to_string();
        let order_ref = order_id.to_string();

        let response = self
            .client
            .post(&url)
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            // Retrying checkout for the same order must not open a second intent.
            .header("Idempotency-Key", format!("order-{order_id}-payment-intent"))
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency.processor_code()),
                ("metadata[order_id]", order_ref.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body).map_or(body, |e| {
                match (e.error.kind, e.error.message) {
                    (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
                    (None, Some(msg)) => msg,
                    (Some(kind), None) => kind,
                    (None, None) => "unknown error".to_string(),
                }
            });
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        tracing::info!(%order_id, payment_intent = %intent.id, "Created payment intent");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_parses() {
        let body = r#"{"error":{"type":"card_error","message":"Your card was declined."}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.kind.as_deref(), Some("card_error"));
        assert_eq!(parsed.error.message.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn test_intent_body_parses() {
        let body = r#"{"id":"pi_123","object":"payment_intent","client_secret":"pi_123_secret_abc","amount":1999}"#;
        let parsed: PaymentIntentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.id, "pi_123");
        assert_eq!(parsed.client_secret, "pi_123_secret_abc");
    }

    #[test]
    fn test_new_trims_api_base() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_test_x"),
            publishable_key: "pk_test_x".to_string(),
            webhook_secret: SecretString::from("whsec_x"),
            api_base: "http://localhost:12111/".to_string(),
            webhook_tolerance_secs: 300,
        };
        let client = StripeClient::new(&config).unwrap();
        assert_eq!(client.api_base, "http://localhost:12111");
    }
}
