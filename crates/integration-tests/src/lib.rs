//! Integration test support for Threadline.
//!
//! The cart, checkout and webhook services are generic over the
//! [`CatalogStore`], [`OrderStore`] and [`PaymentGateway`] traits. This crate
//! provides in-memory implementations so whole purchase flows run without a
//! database or network.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p threadline-integration-tests
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;

use threadline_core::{CurrencyCode, OrderId, ProductId, VariantId};
use threadline_storefront::db::{CatalogStore, OrderStore, RepositoryError};
use threadline_storefront::models::{NewOrder, NewOrderItem, Order, VariantDetails};
use threadline_storefront::services::payments::{PaymentError, PaymentGateway, PaymentIntent};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog of variants keyed by id.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    variants: Mutex<BTreeMap<VariantId, VariantDetails>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant priced at `price_cents / 100`.
    pub fn insert(&self, id: i32, title: &str, size: &str, price_cents: i64) -> VariantId {
        let variant_id = VariantId::new(id);
        lock(&self.variants).insert(
            variant_id,
            VariantDetails {
                variant_id,
                product_id: ProductId::new(id),
                product_title: title.to_string(),
                product_slug: title.to_lowercase().replace(' ', "-"),
                size_name: size.to_string(),
                unit_price: Decimal::new(price_cents, 2),
                image_url: None,
                stock: 10,
            },
        );
        variant_id
    }

    /// Change a product's live price.
    pub fn set_price(&self, id: VariantId, price_cents: i64) {
        if let Some(v) = lock(&self.variants).get_mut(&id) {
            v.unit_price = Decimal::new(price_cents, 2);
        }
    }

    /// Delete a variant from the catalog.
    pub fn remove(&self, id: VariantId) {
        lock(&self.variants).remove(&id);
    }
}

impl CatalogStore for MemoryCatalog {
    async fn variant_details(
        &self,
        ids: &[VariantId],
    ) -> Result<Vec<VariantDetails>, RepositoryError> {
        let variants = lock(&self.variants);
        Ok(ids.iter().filter_map(|id| variants.get(id).cloned()).collect())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// An order as the memory store holds it.
#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub order: Order,
    pub items: Vec<NewOrderItem>,
}

impl StoredOrder {
    /// Sum of the snapshot line costs.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(NewOrderItem::cost).sum()
    }
}

/// Order store that keeps everything in a vector.
#[derive(Debug, Default)]
pub struct MemoryOrders {
    orders: Mutex<Vec<StoredOrder>>,
}

impl MemoryOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of an order by id.
    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<StoredOrder> {
        lock(&self.orders)
            .iter()
            .find(|o| o.order.id == id)
            .cloned()
    }

    /// Number of orders stored.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderStore for MemoryOrders {
    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut orders = lock(&self.orders);
        let next = i32::try_from(orders.len())
            .map_err(|_| RepositoryError::DataCorruption("too many orders".to_string()))?
            + 1;

        let row = Order {
            id: OrderId::new(next),
            customer_name: order.customer_name.clone(),
            email: order.email.as_ref().map(|e| e.as_str().to_string()),
            mobile: order.mobile.clone(),
            address: order.address.clone(),
            created_at: Utc::now(),
            paid: order.paid_on_creation(),
            payment_method: order.payment_method,
            payment_intent_id: None,
        };
        orders.push(StoredOrder {
            order: row.clone(),
            items: items.to_vec(),
        });
        Ok(row)
    }

    async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut orders = lock(&self.orders);
        let stored = orders
            .iter_mut()
            .find(|o| o.order.id == id)
            .ok_or(RepositoryError::NotFound)?;
        stored.order.payment_intent_id = Some(payment_intent_id.to_string());
        Ok(())
    }

    async fn mark_paid(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut orders = lock(&self.orders);
        let Some(stored) = orders.iter_mut().find(|o| o.order.id == id) else {
            return Ok(false);
        };
        stored.order.paid = true;
        Ok(true)
    }
}

// =============================================================================
// Payments
// =============================================================================

/// A payment intent request the fake gateway received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    pub order_id: OrderId,
}

/// Gateway that issues sequential intent ids, or fails on demand.
#[derive(Debug, Default)]
pub struct FakeGateway {
    fail: bool,
    counter: AtomicU32,
    requests: Mutex<Vec<IntentRequest>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every request is declined.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<IntentRequest> {
        lock(&self.requests).clone()
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        order_id: OrderId,
    ) -> Result<PaymentIntent, PaymentError> {
        lock(&self.requests).push(IntentRequest {
            amount_minor,
            currency,
            order_id,
        });

        if self.fail {
            return Err(PaymentError::Api {
                status: 402,
                message: "Your card was declined.".to_string(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_test_{n}"),
            client_secret: format!("pi_test_{n}_secret_abc"),
        })
    }
}
