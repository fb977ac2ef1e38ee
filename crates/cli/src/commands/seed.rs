//! Seed the catalog from a YAML file.
//!
//! The file is parsed and fully validated before connecting to the database,
//! then every record is upserted by slug, so re-running a seed updates names,
//! prices and stock in place.
//!
//! ```yaml
//! categories:
//!   - name: Shirts
//!     sizes: [S, M, L, XL]
//!     subcategories:
//!       - name: Linen
//!       - name: Oxford
//!         slug: oxford-cloth
//!
//! products:
//!   - title: Linen Camp Shirt
//!     category: shirts
//!     subcategory: linen
//!     price: "49.00"
//!     description: Loose fit, coconut buttons.
//!     image_url: /static/img/camp-shirt.jpg
//!     variants:
//!       - { size: S, stock: 4 }
//!       - { size: M, stock: 10 }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use threadline_core::Slug;
use threadline_storefront::db::{self, CatalogRepository, catalog::ProductUpsert};

use super::database_url;

/// Top-level catalog seed file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySeed {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub subcategories: Vec<SubCategorySeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubCategorySeed {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductSeed {
    pub title: String,
    pub slug: Option<String>,
    /// Category slug.
    pub category: String,
    /// Subcategory slug within the category.
    pub subcategory: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: PriceValue,
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSeed {
    pub size: String,
    #[serde(default)]
    pub stock: i32,
}

/// Prices may be written quoted (`"49.00"`) or bare (`49` / `49.5`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl PriceValue {
    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Text(s) => Decimal::from_str(s.trim()).ok(),
            Self::Integer(n) => Some(Decimal::from(*n)),
            // Shortest round-trip formatting keeps 39.99 as 39.99
            Self::Float(f) => Decimal::from_str(&f.to_string()).ok(),
        }
    }
}

/// A category with resolved slugs, ready to write.
#[derive(Debug)]
pub struct CategoryPlan {
    pub name: String,
    pub slug: Slug,
    pub sizes: Vec<String>,
    pub subcategories: Vec<(String, Slug)>,
}

/// A product with resolved references, ready to write.
#[derive(Debug)]
pub struct ProductPlan {
    pub title: String,
    pub slug: Slug,
    pub category: Slug,
    pub subcategory: Option<Slug>,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub active: bool,
    pub variants: Vec<(String, i32)>,
}

/// The validated seed.
#[derive(Debug)]
pub struct CatalogPlan {
    pub categories: Vec<CategoryPlan>,
    pub products: Vec<ProductPlan>,
}

/// Counts reported after seeding.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub categories: usize,
    pub subcategories: usize,
    pub sizes: usize,
    pub products: usize,
    pub variants: usize,
}

fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<Slug, String> {
    let result = match explicit {
        Some(s) => Slug::parse(s),
        None => Slug::from_name(name),
    };
    result.map_err(|e| format!("{name:?}: {e}"))
}

/// Validate a parsed seed file and resolve every reference.
///
/// All problems are collected so one run reports everything wrong with the file.
///
/// # Errors
///
/// Returns the list of validation messages if any check fails.
pub fn validate_catalog(file: &CatalogFile) -> Result<CatalogPlan, Vec<String>> {
    let mut errors = Vec::new();
    let mut categories = Vec::with_capacity(file.categories.len());
    // category slug -> (sizes, subcategory slugs)
    let mut known: HashMap<Slug, (HashSet<&str>, HashSet<Slug>)> = HashMap::new();

    for category in &file.categories {
        let slug = match resolve_slug(category.slug.as_deref(), &category.name) {
            Ok(slug) => slug,
            Err(e) => {
                errors.push(format!("category {e}"));
                continue;
            }
        };
        if known.contains_key(&slug) {
            errors.push(format!("duplicate category slug {slug}"));
            continue;
        }

        let mut sizes = HashSet::new();
        for size in &category.sizes {
            if size.trim().is_empty() {
                errors.push(format!("category {slug}: empty size name"));
            } else if !sizes.insert(size.as_str()) {
                errors.push(format!("category {slug}: duplicate size {size}"));
            }
        }

        let mut sub_slugs = HashSet::new();
        let mut subcategories = Vec::with_capacity(category.subcategories.len());
        for sub in &category.subcategories {
            match resolve_slug(sub.slug.as_deref(), &sub.name) {
                Ok(sub_slug) if !sub_slugs.insert(sub_slug.clone()) => {
                    errors.push(format!("category {slug}: duplicate subcategory slug {sub_slug}"));
                }
                Ok(sub_slug) => subcategories.push((sub.name.clone(), sub_slug)),
                Err(e) => errors.push(format!("category {slug}: subcategory {e}")),
            }
        }

        categories.push(CategoryPlan {
            name: category.name.clone(),
            slug: slug.clone(),
            sizes: category.sizes.clone(),
            subcategories,
        });
        known.insert(slug, (sizes, sub_slugs));
    }

    let mut product_slugs = HashSet::new();
    let mut products = Vec::with_capacity(file.products.len());

    for product in &file.products {
        if product.title.trim().is_empty() {
            errors.push("product with empty title".to_string());
            continue;
        }
        let slug = match resolve_slug(product.slug.as_deref(), &product.title) {
            Ok(slug) => slug,
            Err(e) => {
                errors.push(format!("product {e}"));
                continue;
            }
        };
        if !product_slugs.insert(slug.clone()) {
            errors.push(format!("duplicate product slug {slug}"));
            continue;
        }

        let Some((category_slug, (sizes, sub_slugs))) = Slug::parse(&product.category)
            .ok()
            .and_then(|s| known.get_key_value(&s))
        else {
            errors.push(format!("product {slug}: unknown category {}", product.category));
            continue;
        };

        let subcategory = match product.subcategory.as_deref() {
            None => None,
            Some(sub) => match Slug::parse(sub) {
                Ok(sub_slug) if sub_slugs.contains(&sub_slug) => Some(sub_slug),
                _ => {
                    errors.push(format!(
                        "product {slug}: unknown subcategory {sub} in {category_slug}"
                    ));
                    None
                }
            },
        };

        let price = match product.price.to_decimal() {
            Some(p) if p.is_sign_negative() => {
                errors.push(format!("product {slug}: price cannot be negative"));
                Decimal::ZERO
            }
            Some(p) if p.scale() > 2 && p.normalize().scale() > 2 => {
                errors.push(format!("product {slug}: price has more than 2 decimal places"));
                Decimal::ZERO
            }
            Some(p) => p.round_dp(2),
            None => {
                errors.push(format!("product {slug}: invalid price"));
                Decimal::ZERO
            }
        };

        let mut seen_sizes = HashSet::new();
        let mut variants = Vec::with_capacity(product.variants.len());
        for variant in &product.variants {
            if !sizes.contains(variant.size.as_str()) {
                errors.push(format!(
                    "product {slug}: size {} is not defined for {category_slug}",
                    variant.size
                ));
            } else if !seen_sizes.insert(variant.size.as_str()) {
                errors.push(format!("product {slug}: duplicate variant {}", variant.size));
            } else if variant.stock < 0 {
                errors.push(format!("product {slug}: negative stock for {}", variant.size));
            } else {
                variants.push((variant.size.clone(), variant.stock));
            }
        }

        products.push(ProductPlan {
            title: product.title.trim().to_string(),
            slug,
            category: category_slug.clone(),
            subcategory,
            description: product.description.clone(),
            price,
            image_url: product.image_url.clone(),
            active: product.active,
            variants,
        });
    }

    if errors.is_empty() {
        Ok(CatalogPlan {
            categories,
            products,
        })
    } else {
        Err(errors)
    }
}

/// Write a validated plan to the database.
///
/// # Errors
///
/// Returns an error if any upsert fails. Records written before the failure
/// stay; re-running the seed is safe.
pub async fn apply_plan(
    repo: &CatalogRepository<'_>,
    plan: &CatalogPlan,
) -> Result<SeedResult, db::RepositoryError> {
    let mut result = SeedResult::default();
    let mut categories = HashMap::new();
    let mut subcategories = HashMap::new();
    let mut sizes = HashMap::new();

    for category in &plan.categories {
        let row = repo.upsert_category(&category.name, &category.slug).await?;
        result.categories += 1;

        for size in &category.sizes {
            let size_row = repo.upsert_size(row.id, size).await?;
            sizes.insert((category.slug.clone(), size.clone()), size_row.id);
            result.sizes += 1;
        }
        for (name, slug) in &category.subcategories {
            let sub = repo.upsert_subcategory(row.id, name, slug).await?;
            subcategories.insert((category.slug.clone(), slug.clone()), sub.id);
            result.subcategories += 1;
        }
        categories.insert(category.slug.clone(), row.id);
    }

    for product in &plan.products {
        // Validation guarantees every reference resolves
        let Some(&category_id) = categories.get(&product.category) else {
            continue;
        };
        let sub_category_id = product
            .subcategory
            .as_ref()
            .and_then(|s| subcategories.get(&(product.category.clone(), s.clone())))
            .copied();

        let row = repo
            .upsert_product(&ProductUpsert {
                category_id,
                sub_category_id,
                title: &product.title,
                slug: &product.slug,
                description: &product.description,
                price: product.price,
                image_url: product.image_url.as_deref(),
                active: product.active,
            })
            .await?;
        result.products += 1;

        for (size, stock) in &product.variants {
            if let Some(&size_id) = sizes.get(&(product.category.clone(), size.clone())) {
                repo.upsert_variant(row.id, size_id, *stock).await?;
                result.variants += 1;
            }
        }
    }

    Ok(result)
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// the database URL is missing, or a database write fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    info!(
        categories = file.categories.len(),
        products = file.products.len(),
        "Parsed catalog"
    );

    let plan = match validate_catalog(&file) {
        Ok(plan) => plan,
        Err(errors) => {
            error!("Catalog validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };

    info!("Catalog validated successfully");

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let result = apply_plan(&CatalogRepository::new(&pool), &plan).await?;

    info!("Seeding complete!");
    info!("  Categories: {}", result.categories);
    info!("  Subcategories: {}", result.subcategories);
    info!("  Sizes: {}", result.sizes);
    info!("  Products: {}", result.products);
    info!("  Variants: {}", result.variants);

    Ok(())
}
