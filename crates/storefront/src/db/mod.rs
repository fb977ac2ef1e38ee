//! Database operations for the storefront `PostgreSQL`.
//!
//! # Schema: `shop`
//!
//! - `category`, `sub_category`, `size` - Catalog taxonomy
//! - `product`, `product_size_variant` - Products and per-size stock
//! - `customer_order`, `order_item` - Placed orders and line snapshots
//!
//! Sessions live in the `tower_sessions` schema owned by
//! `tower-sessions-sqlx-store`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p threadline-cli -- migrate
//! ```
//!
//! # Store traits
//!
//! The cart and checkout code talk to [`CatalogStore`] and [`OrderStore`]
//! rather than to the repositories directly, so the integration tests can run
//! them against in-memory stores.

pub mod catalog;
pub mod orders;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use threadline_core::{OrderId, VariantId};

use crate::models::{NewOrder, NewOrderItem, Order, VariantDetails};

pub use catalog::CatalogRepository;
pub use orders::{OrderFilter, OrderRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Read access to the variant data the cart prices against.
pub trait CatalogStore: Sync {
    /// Look up variants (with their product's live price) by id.
    ///
    /// Ids with no matching variant are simply absent from the result.
    fn variant_details(
        &self,
        ids: &[VariantId],
    ) -> impl Future<Output = Result<Vec<VariantDetails>, RepositoryError>> + Send;
}

/// Write access to orders used by checkout and the payment webhook.
pub trait OrderStore: Sync {
    /// Insert an order and all of its items.
    fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Record the payment processor's transaction reference on an order.
    fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Set `paid = true`. Returns `false` if no order has this id.
    fn mark_paid(&self, id: OrderId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation onto [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}
