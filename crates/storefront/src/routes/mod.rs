//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET  /                              - Active products
//! GET  /category/{category}           - Products in a category
//! GET  /category/{category}/{sub}     - Products in a subcategory
//! GET  /products/{slug}               - Product detail with sizes
//!
//! # Cart (JSON mutations)
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add variant_id × qty
//! POST /cart/update                   - Set qty (≤ 0 removes)
//! POST /cart/remove                   - Remove variant_id
//! GET  /cart/count                    - { count }
//!
//! # Checkout
//! GET  /checkout                      - Checkout form
//! POST /checkout                      - Place order
//! GET  /checkout/success              - Confirmation
//! GET  /checkout/cancel               - Payment abandoned
//!
//! # Payment processor
//! POST /stripe/webhook                - Signed payment events
//! ```
//!
//! `/health`, `/health/ready` and `/static` are mounted by the binary.

pub mod cart;
pub mod checkout;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/{category}", get(products::by_category))
        .route("/{category}/{sub}", get(products::by_subcategory))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::form).post(checkout::submit))
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .nest("/category", category_routes())
        .route("/products/{slug}", get(products::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/stripe/webhook", post(webhooks::stripe))
}
