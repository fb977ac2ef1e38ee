//! Session-related constants.

/// Session keys.
pub mod keys {
    /// Key for the visitor's cart (`variant id -> quantity`).
    pub const CART: &str = "cart";
}
