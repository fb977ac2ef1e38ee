//! Product route handlers.
//!
//! Listings show active products only, newest first. The category pages are
//! the same listing narrowed by category or subcategory slug.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;

use threadline_core::{CurrencyCode, Price};

use crate::db::catalog::ProductFilter;
use crate::error::{AppError, Result};
use crate::filters;
use crate::models::{Category, Product, ProductVariant, SubCategory};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
}

impl ProductView {
    fn new(product: Product, currency: CurrencyCode) -> Self {
        Self {
            price: Price::new(product.price, currency).display(),
            slug: product.slug,
            title: product.title,
            description: product.description,
            image_url: product.image_url,
        }
    }
}

/// Size option on the product page.
#[derive(Clone)]
pub struct VariantView {
    pub id: i32,
    pub size: String,
    pub in_stock: bool,
}

impl From<ProductVariant> for VariantView {
    fn from(variant: ProductVariant) -> Self {
        Self {
            id: variant.id.as_i32(),
            in_stock: variant.in_stock(),
            size: variant.size_name,
        }
    }
}

/// Category navigation entry.
#[derive(Clone)]
pub struct NavLink {
    pub name: String,
    pub href: String,
    pub active: bool,
}

fn category_links(categories: Vec<Category>, current: Option<&Category>) -> Vec<NavLink> {
    categories
        .into_iter()
        .map(|c| NavLink {
            active: current.is_some_and(|cur| cur.id == c.id),
            href: format!("/category/{}", c.slug),
            name: c.name,
        })
        .collect()
}

fn subcategory_links(
    category: &Category,
    subcategories: Vec<SubCategory>,
    current: Option<&SubCategory>,
) -> Vec<NavLink> {
    subcategories
        .into_iter()
        .map(|s| NavLink {
            active: current.is_some_and(|cur| cur.id == s.id),
            href: format!("/category/{}/{}", category.slug, s.slug),
            name: s.name,
        })
        .collect()
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub heading: String,
    pub categories: Vec<NavLink>,
    pub subcategories: Vec<NavLink>,
    pub products: Vec<ProductView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductView,
    pub variants: Vec<VariantView>,
}

/// All active products.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<ProductsIndexTemplate> {
    let catalog = state.catalog();
    let categories = catalog.list_categories().await?;
    let products = catalog.list_active_products(ProductFilter::default()).await?;

    Ok(ProductsIndexTemplate {
        heading: "All products".to_string(),
        categories: category_links(categories, None),
        subcategories: Vec::new(),
        products: views(products, state.config().currency),
    })
}

/// Active products in one category.
#[instrument(skip(state))]
pub async fn by_category(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
) -> Result<ProductsIndexTemplate> {
    let catalog = state.catalog();
    let category = catalog
        .get_category_by_slug(&category_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {category_slug}")))?;

    let categories = catalog.list_categories().await?;
    let subcategories = catalog.list_subcategories(category.id).await?;
    let products = catalog
        .list_active_products(ProductFilter {
            category_id: Some(category.id),
            sub_category_id: None,
        })
        .await?;

    Ok(ProductsIndexTemplate {
        categories: category_links(categories, Some(&category)),
        subcategories: subcategory_links(&category, subcategories, None),
        heading: category.name,
        products: views(products, state.config().currency),
    })
}

/// Active products in one subcategory of a category.
#[instrument(skip(state))]
pub async fn by_subcategory(
    State(state): State<AppState>,
    Path((category_slug, sub_slug)): Path<(String, String)>,
) -> Result<ProductsIndexTemplate> {
    let catalog = state.catalog();
    let category = catalog
        .get_category_by_slug(&category_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {category_slug}")))?;
    let sub = catalog
        .get_subcategory(category.id, &sub_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("subcategory {category_slug}/{sub_slug}")))?;

    let categories = catalog.list_categories().await?;
    let subcategories = catalog.list_subcategories(category.id).await?;
    let products = catalog
        .list_active_products(ProductFilter {
            category_id: Some(category.id),
            sub_category_id: Some(sub.id),
        })
        .await?;

    Ok(ProductsIndexTemplate {
        heading: format!("{} / {}", category.name, sub.name),
        categories: category_links(categories, Some(&category)),
        subcategories: subcategory_links(&category, subcategories, Some(&sub)),
        products: views(products, state.config().currency),
    })
}

/// Product detail with its size variants.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ProductShowTemplate> {
    let catalog = state.catalog();
    let product = catalog
        .get_active_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;
    let variants = catalog.variants_for_product(product.id).await?;

    Ok(ProductShowTemplate {
        product: ProductView::new(product, state.config().currency),
        variants: variants.into_iter().map(VariantView::from).collect(),
    })
}

fn views(products: Vec<Product>, currency: CurrencyCode) -> Vec<ProductView> {
    products
        .into_iter()
        .map(|p| ProductView::new(p, currency))
        .collect()
}

#[cfg(test)]
mod tests {
    use threadline_core::{CategoryId, SubCategoryId};

    use super::*;

    fn category(id: i32, slug: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: slug.to_uppercase(),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn test_category_links_mark_current() {
        let shirts = category(1, "shirts");
        let links = category_links(vec![shirts.clone(), category(2, "shoes")], Some(&shirts));
        assert_eq!(links.len(), 2);
        assert!(links[0].active);
        assert!(!links[1].active);
        assert_eq!(links[1].href, "/category/shoes");
    }

    #[test]
    fn test_subcategory_links_nest_under_category() {
        let shirts = category(1, "shirts");
        let linen = SubCategory {
            id: SubCategoryId::new(5),
            category_id: shirts.id,
            name: "Linen".to_string(),
            slug: "linen".to_string(),
        };
        let links = subcategory_links(&shirts, vec![linen.clone()], Some(&linen));
        assert_eq!(links[0].href, "/category/shirts/linen");
        assert!(links[0].active);
    }
}
