//! Catalog product types as exposed to the storefront.
//!
//! These are the assembled read models the query layer returns: the product
//! row plus its ordered images, its variants, and its approved reviews.
//! Prices are cents; variants carry a signed modifier on top of the base
//! price rather than an absolute price of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub category_slug: String,
    /// Base price in cents; variants apply [`ProductVariant::price_modifier_cents`].
    pub price_cents: i64,
    /// Pre-discount comparison price, when the product is on offer.
    pub compare_at_price_cents: Option<i64>,
    pub origin: Option<String>,
    pub tags: Vec<String>,
    /// Product-level stock; `None` means untracked.
    pub stock: Option<i64>,
    pub rating_avg: f32,
    pub rating_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Ordered by `sort_order`, lowest first.
    pub images: Vec<ProductImage>,
    /// Ordered by `sort_order`, lowest first.
    pub variants: Vec<ProductVariant>,
    /// Approved reviews only, newest first.
    pub reviews: Vec<ProductReview>,
}

impl Product {
    /// Price actually charged: the base price plus the chosen variant's
    /// signed modifier, or the base price when no variant is chosen.
    #[must_use]
    pub fn effective_price_cents(&self, variant: Option<&ProductVariant>) -> i64 {
        self.price_cents + variant.map_or(0, |v| v.price_modifier_cents)
    }

    /// Stock shown for the selection: the variant's when one is chosen,
    /// else the product-level stock. `None` means untracked.
    #[must_use]
    pub fn effective_stock(&self, variant: Option<&ProductVariant>) -> Option<i64> {
        match variant {
            Some(v) => v.stock,
            None => self.stock,
        }
    }

    /// The image with the lowest `sort_order`, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.iter().min_by_key(|i| i.sort_order)
    }

    #[must_use]
    pub fn variant(&self, variant_id: i64) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Whether the product is displayed as discounted.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.compare_at_price_cents
            .is_some_and(|compare| compare > self.price_cents)
    }

    /// Rounded-down discount percentage against the comparison price, when
    /// the product is discounted.
    #[must_use]
    pub fn discount_percent(&self) -> Option<i64> {
        self.compare_at_price_cents.and_then(|compare| {
            (compare > self.price_cents && compare > 0)
                .then(|| (compare - self.price_cents) * 100 / compare)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: i64,
    pub url: String,
    pub alt: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: i64,
    /// Display label, e.g. `"Formule 3 mois"`.
    pub label: String,
    /// Signed delta on the product's base price, in cents.
    pub price_modifier_cents: i64,
    /// Variant stock; `None` means untracked.
    pub stock: Option<i64>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReview {
    pub id: i64,
    pub author: String,
    /// 1..=5.
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
