//! Domain models for the storefront.
//!
//! Row types map one-to-one onto the `shop` schema and derive
//! `sqlx::FromRow`; the `New*` types are insert payloads.

pub mod catalog;
pub mod order;
pub mod session;

pub use catalog::{Category, Product, ProductVariant, Size, SubCategory, VariantDetails};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderSummary};
pub use session::keys as session_keys;
