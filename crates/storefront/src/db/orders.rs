//! Order repository.
//!
//! Orders and their items are written in one transaction so a failure while
//! inserting items never leaves a half-populated order behind.

use sqlx::PgPool;

use threadline_core::{OrderId, PaymentMethod};

use super::{OrderStore, RepositoryError};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderSummary};

const ORDER_COLUMNS: &str = "id, customer_name, email, mobile, address, created_at, paid, \
                             payment_method, payment_intent_id";

/// Filters for the admin order listing.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub paid: Option<bool>,
    pub payment_method: Option<PaymentMethod>,
    /// Case-insensitive match against name, mobile or email.
    pub search: Option<String>,
    pub limit: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1");
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Items of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, variant_id, product_id, product_title, size, price, qty
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Orders newest first with their totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSummary>, RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let rows = sqlx::query_as::<_, OrderSummary>(
            r"
            SELECT o.id, o.customer_name, o.email, o.mobile, o.address, o.created_at,
                   o.paid, o.payment_method, o.payment_intent_id,
                   ROUND(COALESCE(SUM(i.price * i.qty), 0), 2) AS total,
                   COUNT(i.id) AS item_count
            FROM shop.customer_order o
            LEFT JOIN shop.order_item i ON i.order_id = o.id
            WHERE ($1::BOOLEAN IS NULL OR o.paid = $1)
              AND ($2::TEXT IS NULL OR o.payment_method = $2)
              AND ($3::TEXT IS NULL
                   OR o.customer_name ILIKE $3
                   OR o.mobile ILIKE $3
                   OR o.email ILIKE $3)
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4
            ",
        )
        .bind(filter.paid)
        .bind(filter.payment_method)
        .bind(pattern)
        .bind(filter.limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Set the paid flag on several orders at once. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_paid(&self, ids: &[OrderId], paid: bool) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(OrderId::as_i32).collect();
        let result = sqlx::query("UPDATE shop.customer_order SET paid = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(paid)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl OrderStore for OrderRepository<'_> {
    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO shop.customer_order
                (customer_name, email, mobile, address, paid, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(&order.customer_name)
            .bind(order.email.as_ref().map(threadline_core::Email::as_str))
            .bind(&order.mobile)
            .bind(&order.address)
            .bind(order.paid_on_creation())
            .bind(order.payment_method)
            .fetch_one(&mut *tx)
            .await?;

        for item in items {
            let qty = i32::try_from(item.qty).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} out of range", item.qty))
            })?;

            sqlx::query(
                r"
                INSERT INTO shop.order_item
                    (order_id, variant_id, product_id, product_title, size, price, qty)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(created.id)
            .bind(item.variant_id)
            .bind(item.product_id)
            .bind(&item.product_title)
            .bind(&item.size)
            .bind(item.price)
            .bind(qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE shop.customer_order SET payment_intent_id = $2 WHERE id = $1")
                .bind(id)
                .bind(payment_intent_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_paid(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE shop.customer_order SET paid = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
