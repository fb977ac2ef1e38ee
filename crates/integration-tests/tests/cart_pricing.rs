//! Cart behaviour against a live catalog.
//!
//! The cart stores only variant ids and quantities, so every total here is
//! computed from whatever the catalog says at the moment of pricing.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use threadline_core::{CurrencyCode, VariantId};
use threadline_integration_tests::MemoryCatalog;
use threadline_storefront::services::cart::{Cart, CartError};

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.insert(1, "Linen Shirt", "M", 4_900);
    catalog.insert(2, "Canvas Sneaker", "9", 6_500);
    catalog
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_adding_same_variant_accumulates() {
    let catalog = catalog();
    let mut cart = Cart::new();

    cart.add_checked(&catalog, VariantId::new(1), 2).await.unwrap();
    cart.add_checked(&catalog, VariantId::new(1), 3).await.unwrap();

    assert_eq!(cart.len(), 1);
    assert_eq!(cart.quantity(VariantId::new(1)), Some(5));
}

#[tokio::test]
async fn test_add_rejects_unknown_variant_and_bad_quantity() {
    let catalog = catalog();
    let mut cart = Cart::new();

    let unknown = cart.add_checked(&catalog, VariantId::new(99), 1).await;
    assert!(matches!(unknown, Err(CartError::UnknownVariant(id)) if id == VariantId::new(99)));

    let zero = cart.add_checked(&catalog, VariantId::new(1), 0).await;
    assert!(matches!(zero, Err(CartError::InvalidQuantity(0))));

    let negative = cart.add_checked(&catalog, VariantId::new(1), -4).await;
    assert!(matches!(negative, Err(CartError::InvalidQuantity(-4))));

    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add_checked(&catalog, VariantId::new(1), 2).await.unwrap();
    cart.add_checked(&catalog, VariantId::new(2), 1).await.unwrap();

    cart.update(VariantId::new(1), 0).unwrap();
    cart.update(VariantId::new(2), -1).unwrap();

    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_quantities_stay_within_orderable_range() {
    let catalog = catalog();
    let mut cart = Cart::new();

    let too_many = cart.add_checked(&catalog, VariantId::new(1), 3_000_000_000).await;
    assert!(matches!(too_many, Err(CartError::InvalidQuantity(3_000_000_000))));
    assert!(cart.is_empty());

    cart.add_checked(&catalog, VariantId::new(1), 1).await.unwrap();
    let update = cart.update(VariantId::new(1), i64::MAX);
    assert!(matches!(update, Err(CartError::InvalidQuantity(i64::MAX))));
    assert_eq!(cart.quantity(VariantId::new(1)), Some(1));

    cart.add_checked(&catalog, VariantId::new(1), i64::from(Cart::MAX_QUANTITY))
        .await
        .unwrap();
    let qty = cart.quantity(VariantId::new(1)).unwrap();
    assert!(i32::try_from(qty).is_ok());
}

// =============================================================================
// Pricing
// =============================================================================

#[tokio::test]
async fn test_total_is_sum_of_lines() {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add_checked(&catalog, VariantId::new(1), 2).await.unwrap();
    cart.add_checked(&catalog, VariantId::new(2), 1).await.unwrap();

    let priced = cart.price(&catalog, CurrencyCode::USD).await.unwrap();

    assert_eq!(priced.lines.len(), 2);
    assert_eq!(priced.total.amount, Decimal::new(16_300, 2));
    assert_eq!(priced.item_count(), 3);
    assert_eq!(priced.total.display(), "$163.00");
}

#[tokio::test]
async fn test_total_follows_live_price() {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add_checked(&catalog, VariantId::new(1), 2).await.unwrap();

    catalog.set_price(VariantId::new(1), 3_900);
    let priced = cart.price(&catalog, CurrencyCode::USD).await.unwrap();

    assert_eq!(priced.total.amount, Decimal::new(7_800, 2));
}

#[tokio::test]
async fn test_removed_variant_drops_out_of_total() {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add_checked(&catalog, VariantId::new(1), 1).await.unwrap();
    cart.add_checked(&catalog, VariantId::new(2), 1).await.unwrap();

    catalog.remove(VariantId::new(2));
    let priced = cart.price(&catalog, CurrencyCode::USD).await.unwrap();

    assert_eq!(priced.lines.len(), 1);
    assert_eq!(priced.total.amount, Decimal::new(4_900, 2));
    // The entry stays in the cart itself
    assert!(cart.contains(VariantId::new(2)));
}

#[tokio::test]
async fn test_empty_cart_prices_to_zero() {
    let priced = Cart::new()
        .price(&catalog(), CurrencyCode::USD)
        .await
        .unwrap();
    assert!(priced.is_empty());
    assert_eq!(priced.total.amount, Decimal::ZERO);
}
