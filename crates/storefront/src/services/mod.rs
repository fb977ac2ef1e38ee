//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Session cart contents and live pricing
//! - `checkout` - Form validation and order placement
//! - `payments` - Payment processor client and webhook verification

pub mod cart;
pub mod checkout;
pub mod payments;
