//! Order row types and insert payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadline_core::{Email, OrderId, OrderItemId, PaymentMethod, ProductId, VariantId};

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub email: Option<String>,
    pub mobile: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub paid: bool,
    pub payment_method: PaymentMethod,
    /// Payment processor transaction reference (card orders only).
    pub payment_intent_id: Option<String>,
}

/// A snapshot of one cart line at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub size: String,
    pub price: Decimal,
    pub qty: i32,
}

impl OrderItem {
    /// Line cost (`price × qty`).
    #[must_use]
    pub fn cost(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

/// Sum of line costs.
#[must_use]
pub fn order_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::cost).sum()
}

/// An order with its computed total, as listed by the admin CLI.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    pub order: Order,
    pub total: Decimal,
    pub item_count: i64,
}

/// Fields required to insert an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub email: Option<Email>,
    pub mobile: String,
    pub address: String,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    /// Paid flag at creation time. Cash-on-delivery orders count as paid.
    #[must_use]
    pub const fn paid_on_creation(&self) -> bool {
        self.payment_method.paid_on_creation()
    }
}

/// Fields required to insert an order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub size: String,
    pub price: Decimal,
    pub qty: u32,
}

impl NewOrderItem {
    /// Line cost (`price × qty`).
    #[must_use]
    pub fn cost(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, qty: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            variant_id: VariantId::new(1),
            product_id: ProductId::new(1),
            product_title: "Linen Shirt".to_string(),
            size: "M".to_string(),
            price: Decimal::new(price, 2),
            qty,
        }
    }

    #[test]
    fn test_order_total_sums_line_costs() {
        let items = vec![item(1999, 2), item(500, 3)];
        assert_eq!(order_total(&items), Decimal::new(5498, 2));
    }

    #[test]
    fn test_order_total_empty() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }
}
