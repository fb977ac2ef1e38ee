//! Session cart.
//!
//! The cart is a `variant id -> quantity` map serialized into the visitor's
//! session under [`session_keys::CART`]. Nothing about price is stored: every
//! read resolves the variants against the catalog, so totals always reflect
//! the current product price.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;

use threadline_core::{CurrencyCode, Price, VariantId};

use crate::db::{CatalogStore, RepositoryError};
use crate::models::{VariantDetails, session_keys};

/// Errors from cart mutations that consult the catalog.
#[derive(Debug, Error)]
pub enum CartError {
    /// The variant does not exist.
    #[error("invalid variant: {0}")]
    UnknownVariant(VariantId),

    /// Quantity is below one when adding, or too large to order.
    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),

    /// Catalog lookup failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cart contents: one entry per variant, quantities always positive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<VariantId, u32>,
}

impl Cart {
    /// Largest quantity one entry may hold; order items store it as `INTEGER`.
    pub const MAX_QUANTITY: u32 = i32::MAX.unsigned_abs();

    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `qty` of a variant, accumulating onto an existing entry.
    ///
    /// The accumulated quantity saturates at [`Cart::MAX_QUANTITY`].
    pub fn add(&mut self, variant_id: VariantId, qty: u32) {
        if qty == 0 {
            return;
        }
        let entry = self.lines.entry(variant_id).or_insert(0);
        *entry = entry.saturating_add(qty).min(Self::MAX_QUANTITY);
    }

    /// Set the quantity of a variant already in the cart.
    ///
    /// Zero or negative quantities remove the entry. Variants not in the cart
    /// are left alone.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `qty` exceeds
    /// [`Cart::MAX_QUANTITY`]; the cart is unchanged.
    pub fn update(&mut self, variant_id: VariantId, qty: i64) -> Result<(), CartError> {
        if qty > i64::from(Self::MAX_QUANTITY) {
            return Err(CartError::InvalidQuantity(qty));
        }
        let Some(current) = self.lines.get_mut(&variant_id) else {
            return Ok(());
        };
        match u32::try_from(qty) {
            Ok(qty) if qty > 0 => *current = qty,
            _ => {
                self.lines.remove(&variant_id);
            }
        }
        Ok(())
    }

    /// Remove a variant. Absent variants are ignored.
    pub fn remove(&mut self, variant_id: VariantId) {
        self.lines.remove(&variant_id);
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Quantity of a variant, if present.
    #[must_use]
    pub fn quantity(&self, variant_id: VariantId) -> Option<u32> {
        self.lines.get(&variant_id).copied()
    }

    /// Whether the variant has an entry.
    #[must_use]
    pub fn contains(&self, variant_id: VariantId) -> bool {
        self.lines.contains_key(&variant_id)
    }

    /// Number of distinct variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all entries.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.values().map(|&q| u64::from(q)).sum()
    }

    /// Variant ids in the cart.
    #[must_use]
    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.lines.keys().copied().collect()
    }

    /// `(variant, quantity)` pairs in variant id order.
    pub fn lines(&self) -> impl Iterator<Item = (VariantId, u32)> + '_ {
        self.lines.iter().map(|(&id, &qty)| (id, qty))
    }

    /// Add a variant after checking it exists in the catalog.
    ///
    /// A variant already in the cart is not looked up again; its quantity
    /// simply grows.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for `qty < 1` or above
    /// [`Cart::MAX_QUANTITY`],
    /// `CartError::UnknownVariant` if the catalog has no such variant.
    pub async fn add_checked<C: CatalogStore>(
        &mut self,
        catalog: &C,
        variant_id: VariantId,
        qty: i64,
    ) -> Result<(), CartError> {
        let qty = u32::try_from(qty)
            .ok()
            .filter(|&q| q > 0 && q <= Self::MAX_QUANTITY)
            .ok_or(CartError::InvalidQuantity(qty))?;

        if !self.contains(variant_id) {
            let found = catalog.variant_details(&[variant_id]).await?;
            if !found.iter().any(|v| v.variant_id == variant_id) {
                return Err(CartError::UnknownVariant(variant_id));
            }
        }

        self.add(variant_id, qty);
        Ok(())
    }

    /// Resolve every entry against the catalog at current prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the catalog lookup fails.
    pub async fn price<C: CatalogStore>(
        &self,
        catalog: &C,
        currency: CurrencyCode,
    ) -> Result<PricedCart, RepositoryError> {
        let details = catalog.variant_details(&self.variant_ids()).await?;
        Ok(PricedCart::resolve(self, details, currency))
    }
}

/// One cart entry with its live price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub variant: VariantDetails,
    pub qty: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// A cart resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Price,
}

impl PricedCart {
    /// Join cart entries with catalog rows.
    ///
    /// Entries whose variant has disappeared from the catalog are skipped.
    #[must_use]
    pub fn resolve(cart: &Cart, details: Vec<VariantDetails>, currency: CurrencyCode) -> Self {
        let mut by_id: HashMap<VariantId, VariantDetails> =
            details.into_iter().map(|d| (d.variant_id, d)).collect();

        let lines: Vec<PricedLine> = cart
            .lines()
            .filter_map(|(variant_id, qty)| {
                let variant = by_id.remove(&variant_id)?;
                let unit_price = Price::new(variant.unit_price, currency);
                Some(PricedLine {
                    variant,
                    qty,
                    unit_price,
                    line_total: unit_price.times(qty),
                })
            })
            .collect();

        let total = lines
            .iter()
            .fold(Price::zero(currency), |acc, line| acc + line.line_total);

        Self { lines, total }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across priced lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.qty)).sum()
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the visitor's cart from the session.
///
/// A missing or unreadable cart value yields an empty cart.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    match session.get::<Cart>(session_keys::CART).await {
        Ok(cart) => Ok(cart.unwrap_or_default()),
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            tracing::warn!(error = %e, "Discarding unreadable cart in session");
            Ok(Cart::default())
        }
        Err(e) => Err(e),
    }
}

/// Persist the cart into the session.
///
/// # Errors
///
/// Returns an error if the cart cannot be serialized or the store write fails.
pub async fn save(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}
