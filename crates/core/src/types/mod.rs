//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod payment;
pub mod price;
pub mod slug;

pub use email::{Email, EmailError};
pub use id::*;
pub use payment::{PaymentMethod, PaymentMethodError};
pub use price::{CurrencyCode, CurrencyError, Price};
pub use slug::{Slug, SlugError};
