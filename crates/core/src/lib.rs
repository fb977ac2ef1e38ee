//! Threadline Core - Shared domain types.
//!
//! This crate provides the types used across all Threadline components:
//! - `storefront` - Public-facing shop (catalog, cart, checkout, webhooks)
//! - `cli` - Command-line tools for migrations, seeding and order admin
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is gated behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, prices, emails, slugs and payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
