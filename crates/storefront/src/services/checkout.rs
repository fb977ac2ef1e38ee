//! Checkout: form validation and order placement.
//!
//! Placement is a single pass over the session cart:
//!
//! 1. Price the cart against the catalog
//! 2. Insert the order and its item snapshots (one transaction)
//! 3. Clear the cart
//! 4. For card orders, open a payment intent and record its id on the order
//!
//! The cart is cleared as soon as step 2 succeeds, so a failed payment step
//! leaves an unpaid order and an empty cart rather than a duplicate order on
//! resubmission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use threadline_core::{CurrencyCode, Email, PaymentMethod, Price};

use super::cart::{Cart, PricedCart};
use super::payments::{PaymentError, PaymentGateway, PaymentIntent};
use crate::db::{CatalogStore, OrderStore, RepositoryError};
use crate::models::{NewOrder, NewOrderItem, Order};

/// Longest accepted customer name.
pub const NAME_MAX_LENGTH: usize = 120;

/// Longest accepted mobile number.
pub const MOBILE_MAX_LENGTH: usize = 15;

/// Raw checkout form as submitted. Every field is optional so that missing
/// inputs become validation messages instead of extractor rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// A user-facing validation message attached to a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn trimmed(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Validate a checkout form into an insertable order.
///
/// # Errors
///
/// Returns every field error found, not just the first.
pub fn validate(form: &CheckoutForm) -> Result<NewOrder, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = trimmed(form.name.as_ref());
    match name {
        None => errors.push(FieldError::new("name", "Name is required.")),
        Some(n) if n.chars().count() > NAME_MAX_LENGTH => errors.push(FieldError::new(
            "name",
            format!("Name must be at most {NAME_MAX_LENGTH} characters."),
        )),
        Some(_) => {}
    }

    let mobile = trimmed(form.mobile.as_ref());
    match mobile {
        None => errors.push(FieldError::new("mobile", "Mobile number is required.")),
        Some(m) if m.chars().count() > MOBILE_MAX_LENGTH => errors.push(FieldError::new(
            "mobile",
            format!("Mobile number must be at most {MOBILE_MAX_LENGTH} characters."),
        )),
        Some(_) => {}
    }

    let address = trimmed(form.address.as_ref());
    if address.is_none() {
        errors.push(FieldError::new("address", "Address is required."));
    }

    let email = match trimmed(form.email.as_ref()).map(Email::parse) {
        None => None,
        Some(Ok(email)) => Some(email),
        Some(Err(_)) => {
            errors.push(FieldError::new("email", "Enter a valid email address."));
            None
        }
    };

    let payment_method = match trimmed(form.payment_method.as_ref()) {
        None => PaymentMethod::default(),
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            errors.push(FieldError::new("payment_method", "Choose a payment method."));
            PaymentMethod::default()
        }),
    };

    match (name, mobile, address) {
        (Some(name), Some(mobile), Some(address)) if errors.is_empty() => Ok(NewOrder {
            customer_name: name.to_string(),
            email,
            mobile: mobile.to_string(),
            address: address.to_string(),
            payment_method,
        }),
        _ => Err(errors),
    }
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has nothing purchasable in it.
    #[error("cart is empty")]
    EmptyCart,

    /// Order storage failed; nothing was created.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The order exists but the payment step failed.
    #[error("payment failed for order {}: {source}", .order.id)]
    Payment {
        order: Box<Order>,
        #[source]
        source: PaymentError,
    },

    /// The payment intent was opened but its id could not be stored.
    #[error("payment intent for order {} not recorded: {source}", .order.id)]
    IntentNotRecorded {
        order: Box<Order>,
        #[source]
        source: RepositoryError,
    },
}

/// A placed order and what the customer must do next.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Cash on delivery: nothing left to do.
    CashOnDelivery { order: Order, total: Price },
    /// Card: the browser must confirm the intent with the processor.
    Card {
        order: Order,
        intent: PaymentIntent,
        total: Price,
    },
}

impl CheckoutOutcome {
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::CashOnDelivery { order, .. } | Self::Card { order, .. } => order,
        }
    }

    #[must_use]
    pub const fn total(&self) -> Price {
        match self {
            Self::CashOnDelivery { total, .. } | Self::Card { total, .. } => *total,
        }
    }
}

/// Snapshot priced cart lines into order items.
#[must_use]
pub fn order_items(priced: &PricedCart) -> Vec<NewOrderItem> {
    priced
        .lines
        .iter()
        .map(|line| NewOrderItem {
            variant_id: line.variant.variant_id,
            product_id: line.variant.product_id,
            product_title: line.variant.product_title.clone(),
            size: line.variant.size_name.clone(),
            price: line.unit_price.amount,
            qty: line.qty,
        })
        .collect()
}

/// Place an order for the cart's current contents.
///
/// On success the cart is empty. It is also emptied when only the payment
/// step fails; the caller must persist it either way.
///
/// # Errors
///
/// - `CheckoutError::EmptyCart` if no cart entry resolves to a variant
/// - `CheckoutError::Repository` if pricing or order creation fails
/// - `CheckoutError::Payment` if the card payment could not be opened
/// - `CheckoutError::IntentNotRecorded` if the intent id could not be stored
#[tracing::instrument(skip_all, fields(payment_method = %order.payment_method))]
pub async fn place_order<C, S, G>(
    catalog: &C,
    orders: &S,
    gateway: &G,
    cart: &mut Cart,
    order: NewOrder,
    currency: CurrencyCode,
) -> Result<CheckoutOutcome, CheckoutError>
where
    C: CatalogStore,
    S: OrderStore,
    G: PaymentGateway,
{
    let priced = cart.price(catalog, currency).await?;
    if priced.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let items = order_items(&priced);
    let created = orders.create_order(&order, &items).await?;
    cart.clear();

    tracing::info!(
        order_id = %created.id,
        total = %priced.total,
        items = items.len(),
        "Order created"
    );

    match created.payment_method {
        PaymentMethod::CashOnDelivery => Ok(CheckoutOutcome::CashOnDelivery {
            order: created,
            total: priced.total,
        }),
        PaymentMethod::Card => {
            let total = priced.total;
            let intent = match open_payment(gateway, &created, total).await {
                Ok(intent) => intent,
                Err(source) => {
                    return Err(CheckoutError::Payment {
                        order: Box::new(created),
                        source,
                    });
                }
            };

            if let Err(source) = orders.set_payment_intent(created.id, &intent.id).await {
                // The webhook carries the order id in metadata, so the order
                // can still be settled without the stored reference.
                tracing::error!(
                    order_id = %created.id,
                    payment_intent = %intent.id,
                    error = %source,
                    "Failed to store payment intent id"
                );
                return Err(CheckoutError::IntentNotRecorded {
                    order: Box::new(created),
                    source,
                });
            }

            let mut order = created;
            order.payment_intent_id = Some(intent.id.clone());
            Ok(CheckoutOutcome::Card {
                order,
                intent,
                total,
            })
        }
    }
}

async fn open_payment<G: PaymentGateway>(
    gateway: &G,
    order: &Order,
    total: Price,
) -> Result<PaymentIntent, PaymentError> {
    let amount = total
        .to_minor_units()
        .ok_or(PaymentError::AmountOutOfRange)?;

    gateway
        .create_payment_intent(amount, total.currency_code, order.id)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: Some("  Asha Rao ".to_string()),
            email: Some("asha@example.com".to_string()),
            mobile: Some("9876543210".to_string()),
            address: Some("12 Lake Road".to_string()),
            payment_method: None,
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_valid_form_defaults_to_cod() {
        let order = validate(&form()).unwrap();
        assert_eq!(order.customer_name, "Asha Rao");
        assert_eq!(order.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(order.email.unwrap().as_str(), "asha@example.com");
    }

    #[test]
    fn test_card_method_parsed() {
        let mut f = form();
        f.payment_method = Some("CARD".to_string());
        assert_eq!(validate(&f).unwrap().payment_method, PaymentMethod::Card);
    }

    #[test]
    fn test_email_optional() {
        let mut f = form();
        f.email = Some("   ".to_string());
        assert!(validate(&f).unwrap().email.is_none());
    }

    #[test]
    fn test_missing_required_fields_all_reported() {
        let errors = validate(&CheckoutForm::default()).unwrap_err();
        assert_eq!(fields(&errors), vec!["name", "mobile", "address"]);
    }

    #[test]
    fn test_length_limits() {
        let mut f = form();
        f.name = Some("x".repeat(NAME_MAX_LENGTH + 1));
        f.mobile = Some("1".repeat(MOBILE_MAX_LENGTH + 1));
        let errors = validate(&f).unwrap_err();
        assert_eq!(fields(&errors), vec!["name", "mobile"]);

        let mut f = form();
        f.mobile = Some("1".repeat(MOBILE_MAX_LENGTH));
        assert!(validate(&f).is_ok());
    }

    #[test]
    fn test_invalid_email_and_method() {
        let mut f = form();
        f.email = Some("not-an-email".to_string());
        f.payment_method = Some("bitcoin".to_string());
        let errors = validate(&f).unwrap_err();
        assert_eq!(fields(&errors), vec!["email", "payment_method"]);
    }
}
