//! Demo catalog file: the YAML document the seeder ingests.
//!
//! This is the one place where prices are human-entered display strings
//! (`"34,90 €"`); they are parsed to cents here, leniently, and never
//! re-parsed afterwards. A malformed base price degrades to `0` with a
//! warning rather than aborting ingestion: a broken line in hand-edited
//! data must not take the whole seed down.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogFileError;
use crate::money::parse_price_cents;

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub categories: Vec<CategorySpec>,
    pub products: Vec<ProductSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySpec {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSpec {
    pub slug: String,
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    /// Slug of a category declared in the same file.
    pub category: String,
    /// Display-format price, e.g. `"34,90 €"`.
    pub price: String,
    /// Optional pre-discount comparison price, same format.
    pub compare_at_price: Option<String>,
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub stock: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub images: Vec<ImageSpec>,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
    #[serde(default)]
    pub reviews: Vec<ReviewSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    pub url: String,
    pub alt: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    pub label: String,
    /// Signed display-format delta, e.g. `"+5,00 €"` or `"-2,00 €"`.
    pub price_modifier: Option<String>,
    pub stock: Option<i64>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSpec {
    pub author: String,
    /// 1..=5.
    pub rating: i16,
    pub comment: Option<String>,
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

impl ProductSpec {
    /// Base price in cents. Malformed input degrades to `0` and warns.
    #[must_use]
    pub fn price_cents(&self) -> i64 {
        parse_price_cents(&self.price).unwrap_or_else(|| {
            tracing::warn!(
                product = %self.slug,
                raw = %self.price,
                "unparseable catalog price, ingesting as 0"
            );
            0
        })
    }

    /// Comparison price in cents. A malformed value is dropped (warned),
    /// not zeroed: a bogus strikethrough price should simply not display.
    #[must_use]
    pub fn compare_at_price_cents(&self) -> Option<i64> {
        let raw = self.compare_at_price.as_deref()?;
        let parsed = parse_price_cents(raw);
        if parsed.is_none() {
            tracing::warn!(
                product = %self.slug,
                raw = %raw,
                "unparseable comparison price, dropping it"
            );
        }
        parsed
    }
}

impl VariantSpec {
    /// Signed price delta in cents; absent means `0`, malformed degrades
    /// to `0` and warns.
    #[must_use]
    pub fn price_modifier_cents(&self, product_slug: &str) -> i64 {
        let Some(raw) = self.price_modifier.as_deref() else {
            return 0;
        };
        parse_price_cents(raw).unwrap_or_else(|| {
            tracing::warn!(
                product = %product_slug,
                variant = %self.label,
                raw = %raw,
                "unparseable variant price modifier, ingesting as 0"
            );
            0
        })
    }
}

/// Load and validate the catalog from a YAML file.
///
/// # Errors
///
/// Returns `CatalogFileError` if the file cannot be read, parsed, or fails
/// validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, CatalogFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogFileError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile = serde_yaml::from_str(&content)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), CatalogFileError> {
    let mut category_slugs = HashSet::new();
    for category in &catalog.categories {
        if !is_valid_slug(&category.slug) {
            return Err(CatalogFileError::Validation(format!(
                "invalid category slug: '{}'",
                category.slug
            )));
        }
        if category.name.trim().is_empty() {
            return Err(CatalogFileError::Validation(format!(
                "category '{}' has an empty name",
                category.slug
            )));
        }
        if !category_slugs.insert(category.slug.as_str()) {
            return Err(CatalogFileError::Validation(format!(
                "duplicate category slug: '{}'",
                category.slug
            )));
        }
    }

    let mut product_slugs = HashSet::new();
    for product in &catalog.products {
        if !is_valid_slug(&product.slug) {
            return Err(CatalogFileError::Validation(format!(
                "invalid product slug: '{}'",
                product.slug
            )));
        }
        if product.name.trim().is_empty() {
            return Err(CatalogFileError::Validation(format!(
                "product '{}' has an empty name",
                product.slug
            )));
        }
        if !product_slugs.insert(product.slug.as_str()) {
            return Err(CatalogFileError::Validation(format!(
                "duplicate product slug: '{}'",
                product.slug
            )));
        }
        if !category_slugs.contains(product.category.as_str()) {
            return Err(CatalogFileError::Validation(format!(
                "product '{}' references unknown category '{}'",
                product.slug, product.category
            )));
        }

        let mut variant_labels = HashSet::new();
        for variant in &product.variants {
            if variant.label.trim().is_empty() {
                return Err(CatalogFileError::Validation(format!(
                    "product '{}' has a variant with an empty label",
                    product.slug
                )));
            }
            if !variant_labels.insert(variant.label.as_str()) {
                return Err(CatalogFileError::Validation(format!(
                    "product '{}' has duplicate variant label '{}'",
                    product.slug, variant.label
                )));
            }
        }

        for review in &product.reviews {
            if !(1..=5).contains(&review.rating) {
                return Err(CatalogFileError::Validation(format!(
                    "product '{}' has review rating {} out of the 1..=5 range",
                    product.slug, review.rating
                )));
            }
        }
    }

    Ok(())
}

/// Slugs are declared, not generated: lowercase ASCII alphanumerics and
/// dashes, non-empty, no leading/trailing/double dash.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
}
