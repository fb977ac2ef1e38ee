//! Catalog row types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadline_core::{CategoryId, ProductId, SizeId, SubCategoryId, VariantId};

/// A top-level catalog category (e.g. "Men", "Kids").
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A subdivision of a category. Slugs are unique within their category only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubCategory {
    pub id: SubCategoryId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A size label defined for one category (e.g. "M", "32").
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Size {
    pub id: SizeId,
    pub category_id: CategoryId,
    pub name: String,
}

/// A product as listed in the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub sub_category_id: Option<SubCategoryId>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// One purchasable size of a product, joined with its size label.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size_id: SizeId,
    pub size_name: String,
    pub stock: i32,
}

impl ProductVariant {
    /// Whether any stock is recorded for this size.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Everything the cart needs to price a variant at read time.
///
/// `unit_price` is the product's current price, not the price when the
/// visitor added it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VariantDetails {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub size_name: String,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
    pub stock: i32,
}
