//! Catalog read queries for the storefront: filtered search, product detail,
//! and the newest-products rail.
//!
//! Search criteria compose as optional `($n IS NULL OR …)` clauses over
//! active products. Nested collections (images, variants, approved reviews)
//! are each loaded in one `= ANY($ids)` query and grouped in Rust, so a
//! result set costs four round-trips regardless of row count. Tag matching
//! is an OR of case-insensitive substring probes and stays out of the SQL;
//! it is applied after shaping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use qvtbox_core::filters::tags_match;
use qvtbox_core::{Product, ProductImage, ProductReview, ProductVariant, SearchFilters, SortKey};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A `products` row joined with its category slug.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub category_slug: String,
    pub price_cents: i64,
    pub compare_at_price_cents: Option<i64>,
    pub origin: Option<String>,
    pub tags: Vec<String>,
    pub stock: Option<i64>,
    pub rating_avg: f32,
    pub rating_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A row from `product_images`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductImageRow {
    pub id: i64,
    pub product_id: i64,
    pub url: String,
    pub alt: Option<String>,
    pub sort_order: i32,
}

/// A row from `product_variants`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductVariantRow {
    pub id: i64,
    pub product_id: i64,
    pub label: String,
    pub price_modifier_cents: i64,
    pub stock: Option<i64>,
    pub sort_order: i32,
}

/// A row from `product_reviews`. Queries only ever select approved rows, so
/// the flag itself is not carried.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductReviewRow {
    pub id: i64,
    pub product_id: i64,
    pub author: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversions to the core read models
// ---------------------------------------------------------------------------

impl From<ProductImageRow> for ProductImage {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            alt: row.alt,
            sort_order: row.sort_order,
        }
    }
}

impl From<ProductVariantRow> for ProductVariant {
    fn from(row: ProductVariantRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            price_modifier_cents: row.price_modifier_cents,
            stock: row.stock,
            sort_order: row.sort_order,
        }
    }
}

impl From<ProductReviewRow> for ProductReview {
    fn from(row: ProductReviewRow) -> Self {
        Self {
            id: row.id,
            author: row.author,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

impl ProductRow {
    /// Assembles the full read model from this row and its already-loaded
    /// collections.
    #[must_use]
    pub fn into_product(
        self,
        images: Vec<ProductImage>,
        variants: Vec<ProductVariant>,
        reviews: Vec<ProductReview>,
    ) -> Product {
        Product {
            id: self.id,
            slug: self.slug,
            name: self.name,
            short_description: self.short_description,
            description: self.description,
            category_slug: self.category_slug,
            price_cents: self.price_cents,
            compare_at_price_cents: self.compare_at_price_cents,
            origin: self.origin,
            tags: self.tags,
            stock: self.stock,
            rating_avg: self.rating_avg,
            rating_count: self.rating_count,
            is_active: self.is_active,
            created_at: self.created_at,
            images,
            variants,
            reviews,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn order_by_clause(sort: SortKey) -> &'static str {
    // Every ordering carries an id tiebreak: equal sort keys must not
    // reorder between runs.
    match sort {
        SortKey::Name => "p.name ASC, p.id ASC",
        SortKey::PriceAsc => "p.price_cents ASC, p.id ASC",
        SortKey::PriceDesc => "p.price_cents DESC, p.id ASC",
        SortKey::Rating => "p.rating_avg DESC, p.id ASC",
        SortKey::Newest => "p.created_at DESC, p.id DESC",
    }
}

/// Runs the storefront search over active products.
///
/// Filters are normalized first; a fully-empty filter set returns an empty
/// list without touching the pool, since the storefront shows its default
/// landing content in that state and has nothing to ask the database for.
///
/// Tag criteria match when any wanted tag is a case-insensitive substring of
/// any product tag; they are applied after the SQL rows are shaped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn search_products(
    pool: &PgPool,
    filters: &SearchFilters,
) -> Result<Vec<Product>, DbError> {
    let filters = filters.clone().normalized();
    if filters.is_empty() {
        return Ok(Vec::new());
    }

    // ORDER BY cannot be bound, so the clause is interpolated from the fixed
    // table above; everything user-supplied goes through binds.
    let sql = format!(
        "SELECT \
             p.id, p.slug, p.name, p.short_description, p.description, \
             c.slug AS category_slug, p.price_cents, p.compare_at_price_cents, \
             p.origin, p.tags, p.stock, p.rating_avg, p.rating_count, \
             p.is_active, p.created_at \
         FROM products p \
         JOIN categories c ON c.id = p.category_id \
         WHERE p.is_active = TRUE \
           AND ($1::TEXT IS NULL OR p.search_tsv @@ plainto_tsquery('french', $1)) \
           AND ($2::TEXT IS NULL OR c.slug = $2) \
           AND ($3::BIGINT IS NULL OR p.price_cents >= $3) \
           AND ($4::BIGINT IS NULL OR p.price_cents <= $4) \
           AND ($5::REAL IS NULL OR p.rating_avg >= $5) \
           AND ($6::TEXT IS NULL OR p.origin ILIKE '%' || $6 || '%') \
         ORDER BY {}",
        order_by_clause(filters.effective_sort()),
    );

    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(filters.query.as_deref())
        .bind(filters.category.as_deref())
        .bind(filters.price.as_ref().and_then(|range| range.min_cents))
        .bind(filters.price.as_ref().and_then(|range| range.max_cents))
        .bind(filters.min_rating)
        .bind(filters.origin.as_deref())
        .fetch_all(pool)
        .await?;

    let products = attach_collections(pool, rows).await?;
    if filters.tags.is_empty() {
        return Ok(products);
    }
    Ok(products
        .into_iter()
        .filter(|product| tags_match(&product.tags, &filters.tags))
        .collect())
}

/// Fetches one active product by slug with all collections attached.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no active product has the slug, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn get_product_by_slug(pool: &PgPool, slug: &str) -> Result<Product, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT \
             p.id, p.slug, p.name, p.short_description, p.description, \
             c.slug AS category_slug, p.price_cents, p.compare_at_price_cents, \
             p.origin, p.tags, p.stock, p.rating_avg, p.rating_count, \
             p.is_active, p.created_at \
         FROM products p \
         JOIN categories c ON c.id = p.category_id \
         WHERE p.is_active = TRUE \
           AND p.slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    let mut products = attach_collections(pool, vec![row]).await?;
    products.pop().ok_or(DbError::NotFound)
}

/// Returns the newest active products for the storefront highlight rail.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_newest_products(pool: &PgPool, limit: i64) -> Result<Vec<Product>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT \
             p.id, p.slug, p.name, p.short_description, p.description, \
             c.slug AS category_slug, p.price_cents, p.compare_at_price_cents, \
             p.origin, p.tags, p.stock, p.rating_avg, p.rating_count, \
             p.is_active, p.created_at \
         FROM products p \
         JOIN categories c ON c.id = p.category_id \
         WHERE p.is_active = TRUE \
         ORDER BY p.created_at DESC, p.id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    attach_collections(pool, rows).await
}

/// Returns all categories ordered by display name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, slug, name, description, created_at \
         FROM categories \
         ORDER BY name ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Result shaping
// ---------------------------------------------------------------------------

/// Loads images, variants, and approved reviews for the given rows in one
/// query per collection, then assembles the read models preserving row order.
async fn attach_collections(pool: &PgPool, rows: Vec<ProductRow>) -> Result<Vec<Product>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    let image_rows = sqlx::query_as::<_, ProductImageRow>(
        "SELECT id, product_id, url, alt, sort_order \
         FROM product_images \
         WHERE product_id = ANY($1) \
         ORDER BY sort_order ASC, id ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let variant_rows = sqlx::query_as::<_, ProductVariantRow>(
        "SELECT id, product_id, label, price_modifier_cents, stock, sort_order \
         FROM product_variants \
         WHERE product_id = ANY($1) \
         ORDER BY sort_order ASC, id ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let review_rows = sqlx::query_as::<_, ProductReviewRow>(
        "SELECT id, product_id, author, rating, comment, created_at \
         FROM product_reviews \
         WHERE product_id = ANY($1) \
           AND approved = TRUE \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut images: HashMap<i64, Vec<ProductImage>> = HashMap::new();
    for row in image_rows {
        images.entry(row.product_id).or_default().push(row.into());
    }

    let mut variants: HashMap<i64, Vec<ProductVariant>> = HashMap::new();
    for row in variant_rows {
        variants.entry(row.product_id).or_default().push(row.into());
    }

    let mut reviews: HashMap<i64, Vec<ProductReview>> = HashMap::new();
    for row in review_rows {
        reviews.entry(row.product_id).or_default().push(row.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_product(
                images.remove(&id).unwrap_or_default(),
                variants.remove(&id).unwrap_or_default(),
                reviews.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}
