//! Threadline storefront library.
//!
//! Catalog browsing, a session cart, checkout with cash-on-delivery or card
//! payment through Stripe, and the webhook that settles card orders. The
//! binary in `main.rs` wires these into an axum server; the modules are
//! exposed so the CLI and the integration tests can reuse them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
