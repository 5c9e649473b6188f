//! Catalog seeding from the YAML catalog file.

use std::collections::HashMap;

use qvtbox_core::catalog_file::{CatalogFile, ReviewSpec};
use sqlx::PgPool;

use crate::DbError;

/// Counts returned by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
}

/// Upserts the catalog file into the database, keyed on slug.
///
/// Categories land first so products can reference them. Product collections
/// (images, variants, reviews) are replaced wholesale on every run: the file
/// is the source of truth for them and stale children must not survive a
/// re-seed. `rating_avg` / `rating_count` are recomputed from the approved
/// reviews in the file.
///
/// All upserts run inside a single transaction; if any operation fails the
/// entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if a product references a category that is
/// neither declared in the file nor already in the database, or
/// [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    let mut category_ids: HashMap<&str, i64> = HashMap::new();
    for category in &catalog.categories {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (slug, name, description) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 description = EXCLUDED.description \
             RETURNING id",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&mut *tx)
        .await?;

        category_ids.insert(category.slug.as_str(), id);
        summary.categories += 1;
    }

    for product in &catalog.products {
        let category_id = match category_ids.get(product.category.as_str()) {
            Some(id) => *id,
            // Not declared in this file; accept a category already present
            // in the database.
            None => sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE slug = $1")
                .bind(&product.category)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DbError::NotFound)?,
        };

        let product_id: i64 = sqlx::query_scalar(
            "INSERT INTO products \
                 (slug, name, short_description, description, category_id, price_cents, \
                  compare_at_price_cents, origin, tags, stock, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 short_description = EXCLUDED.short_description, \
                 description = EXCLUDED.description, \
                 category_id = EXCLUDED.category_id, \
                 price_cents = EXCLUDED.price_cents, \
                 compare_at_price_cents = EXCLUDED.compare_at_price_cents, \
                 origin = EXCLUDED.origin, \
                 tags = EXCLUDED.tags, \
                 stock = EXCLUDED.stock, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.short_description)
        .bind(&product.description)
        .bind(category_id)
        .bind(product.price_cents())
        .bind(product.compare_at_price_cents())
        .bind(&product.origin)
        .bind(&product.tags)
        .bind(product.stock)
        .bind(product.is_active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_reviews WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for image in &product.images {
            sqlx::query(
                "INSERT INTO product_images (product_id, url, alt, sort_order) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(product_id)
            .bind(&image.url)
            .bind(&image.alt)
            .bind(image.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        for variant in &product.variants {
            sqlx::query(
                "INSERT INTO product_variants \
                     (product_id, label, price_modifier_cents, stock, sort_order) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(product_id)
            .bind(&variant.label)
            .bind(variant.price_modifier_cents(&product.slug))
            .bind(variant.stock)
            .bind(variant.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        for review in &product.reviews {
            sqlx::query(
                "INSERT INTO product_reviews (product_id, author, rating, comment, approved) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(product_id)
            .bind(&review.author)
            .bind(review.rating)
            .bind(&review.comment)
            .bind(review.approved)
            .execute(&mut *tx)
            .await?;
        }

        let (rating_avg, rating_count) = approved_rating_stats(&product.reviews);
        sqlx::query("UPDATE products SET rating_avg = $1, rating_count = $2 WHERE id = $3")
            .bind(rating_avg)
            .bind(rating_count)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        summary.products += 1;
    }

    tx.commit().await?;
    Ok(summary)
}

/// Average and count over approved reviews; `(0.0, 0)` when there are none.
fn approved_rating_stats(reviews: &[ReviewSpec]) -> (f32, i64) {
    let ratings: Vec<i16> = reviews
        .iter()
        .filter(|review| review.approved)
        .map(|review| review.rating)
        .collect();
    if ratings.is_empty() {
        return (0.0, 0);
    }

    let sum: i32 = ratings.iter().copied().map(i32::from).sum();
    let count = i64::try_from(ratings.len()).unwrap_or(i64::MAX);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let avg = (f64::from(sum) / ratings.len() as f64) as f32;

    (avg, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i16, approved: bool) -> ReviewSpec {
        ReviewSpec {
            author: "Camille".to_string(),
            rating,
            comment: None,
            approved,
        }
    }

    #[test]
    fn rating_stats_ignore_unapproved_reviews() {
        let (avg, count) =
            approved_rating_stats(&[review(5, true), review(1, false), review(4, true)]);

        assert_eq!(count, 2);
        assert!((avg - 4.5).abs() < f32::EPSILON);
    }

    #[test]
    fn rating_stats_default_to_zero_without_reviews() {
        let (avg, count) = approved_rating_stats(&[]);

        assert_eq!(count, 0);
        assert!(avg.abs() < f32::EPSILON);
    }
}
