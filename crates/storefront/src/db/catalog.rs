//! Catalog repository: categories, subcategories, sizes, products and variants.

use rust_decimal::Decimal;
use sqlx::PgPool;

use threadline_core::{CategoryId, ProductId, SizeId, Slug, SubCategoryId, VariantId};

use super::{CatalogStore, RepositoryError, conflict_on_unique};
use crate::models::{Category, Product, ProductVariant, Size, SubCategory, VariantDetails};

const PRODUCT_COLUMNS: &str = "id, category_id, sub_category_id, title, slug, description, \
                               price, image_url, active, created_at";

/// Optional narrowing for product listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub sub_category_id: Option<SubCategoryId>,
}

/// Product fields written by catalog seeding.
#[derive(Debug, Clone)]
pub struct ProductUpsert<'a> {
    pub category_id: CategoryId,
    pub sub_category_id: Option<SubCategoryId>,
    pub title: &'a str,
    pub slug: &'a Slug,
    pub description: &'a str,
    pub price: Decimal,
    pub image_url: Option<&'a str>,
    pub active: bool,
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM shop.category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM shop.category WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Subcategories of a category, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_subcategories(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<SubCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, SubCategory>(
            r"
            SELECT id, category_id, name, slug
            FROM shop.sub_category
            WHERE category_id = $1
            ORDER BY name
            ",
        )
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a subcategory by slug within its parent category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_subcategory(
        &self,
        category_id: CategoryId,
        slug: &str,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        let row = sqlx::query_as::<_, SubCategory>(
            r"
            SELECT id, category_id, name, slug
            FROM shop.sub_category
            WHERE category_id = $1 AND slug = $2
            ",
        )
        .bind(category_id)
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Active products, newest first, optionally narrowed by category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product
            WHERE active
              AND ($1::INTEGER IS NULL OR category_id = $1)
              AND ($2::INTEGER IS NULL OR sub_category_id = $2)
            ORDER BY created_at DESC, id DESC
            "
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category_id)
            .bind(filter.sub_category_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get an active product by slug. Inactive products are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE slug = $1 AND active");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Size variants of a product, in size creation order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductVariant>(
            r"
            SELECT v.id, v.product_id, v.size_id, s.name AS size_name, v.stock
            FROM shop.product_size_variant v
            JOIN shop.size s ON s.id = v.size_id
            WHERE v.product_id = $1
            ORDER BY s.id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a category or rename the existing one with this slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_category(&self, name: &str, slug: &Slug) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO shop.category (name, slug)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, slug
            ",
        )
        .bind(name)
        .bind(slug.as_str())
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a subcategory or rename the existing one with this slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_subcategory(
        &self,
        category_id: CategoryId,
        name: &str,
        slug: &Slug,
    ) -> Result<SubCategory, RepositoryError> {
        let row = sqlx::query_as::<_, SubCategory>(
            r"
            INSERT INTO shop.sub_category (category_id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (category_id, slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, category_id, name, slug
            ",
        )
        .bind(category_id)
        .bind(name)
        .bind(slug.as_str())
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a size for a category unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_size(
        &self,
        category_id: CategoryId,
        name: &str,
    ) -> Result<Size, RepositoryError> {
        let row = sqlx::query_as::<_, Size>(
            r"
            INSERT INTO shop.size (category_id, name)
            VALUES ($1, $2)
            ON CONFLICT (category_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, category_id, name
            ",
        )
        .bind(category_id)
        .bind(name)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a product or update the existing one with this slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_product(
        &self,
        product: &ProductUpsert<'_>,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop.product
                (category_id, sub_category_id, title, slug, description, price, image_url, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (slug) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                sub_category_id = EXCLUDED.sub_category_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                image_url = EXCLUDED.image_url,
                active = EXCLUDED.active
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(product.category_id)
            .bind(product.sub_category_id)
            .bind(product.title)
            .bind(product.slug.as_str())
            .bind(product.description)
            .bind(product.price)
            .bind(product.image_url)
            .bind(product.active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "product slug"))?;
        Ok(row)
    }

    /// Insert a (product, size) variant or overwrite its stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_variant(
        &self,
        product_id: ProductId,
        size_id: SizeId,
        stock: i32,
    ) -> Result<VariantId, RepositoryError> {
        let (id,): (VariantId,) = sqlx::query_as(
            r"
            INSERT INTO shop.product_size_variant (product_id, size_id, stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, size_id) DO UPDATE SET stock = EXCLUDED.stock
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(size_id)
        .bind(stock)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }
}

impl CatalogStore for CatalogRepository<'_> {
    async fn variant_details(
        &self,
        ids: &[VariantId],
    ) -> Result<Vec<VariantDetails>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = ids.iter().map(VariantId::as_i32).collect();
        let rows = sqlx::query_as::<_, VariantDetails>(
            r"
            SELECT v.id AS variant_id,
                   p.id AS product_id,
                   p.title AS product_title,
                   p.slug AS product_slug,
                   s.name AS size_name,
                   p.price AS unit_price,
                   p.image_url,
                   v.stock
            FROM shop.product_size_variant v
            JOIN shop.product p ON p.id = v.product_id
            JOIN shop.size s ON s.id = v.size_id
            WHERE v.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
