//! Payment processor integration.
//!
//! Card payments are delegated entirely to Stripe: checkout creates a payment
//! intent through [`PaymentGateway`], the browser confirms it with Stripe.js,
//! and Stripe reports the result back through the signed webhook handled in
//! [`webhook`].

pub mod stripe;
pub mod webhook;

use std::future::Future;

use thiserror::Error;

use threadline_core::{CurrencyCode, OrderId};

pub use stripe::StripeClient;

/// Errors from the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Processor returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Order total cannot be expressed in minor units.
    #[error("amount out of range")]
    AmountOutOfRange,
}

/// A processor-side payment transaction awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Processor transaction id, stored on the order.
    pub id: String,
    /// Secret handed to the browser to confirm the payment.
    pub client_secret: String,
}

/// Something that can open a card payment for an order.
pub trait PaymentGateway: Sync {
    /// Create a payment intent for `amount_minor` (cents) tagged with the order id.
    fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        order_id: OrderId,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;
}
