//! Catalog endpoints: faceted search, product detail, featured rail.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qvtbox_core::filters::SearchFilters;
use qvtbox_core::money::format_cents_eur;
use qvtbox_core::products::Product;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// Card-sized projection for search results and the featured rail.
#[derive(Debug, Serialize)]
pub(super) struct ProductSummary {
    id: i64,
    slug: String,
    name: String,
    short_description: Option<String>,
    category: String,
    price_cents: i64,
    price: String,
    compare_at_price_cents: Option<i64>,
    discount_percent: Option<i64>,
    rating_avg: f32,
    rating_count: i64,
    origin: Option<String>,
    tags: Vec<String>,
    image: Option<String>,
}

impl From<Product> for ProductSummary {
    fn from(product: Product) -> Self {
        let image = product.primary_image().map(|img| img.url.clone());
        let discount_percent = product.discount_percent();
        Self {
            id: product.id,
            slug: product.slug,
            name: product.name,
            short_description: product.short_description,
            category: product.category_slug,
            price_cents: product.price_cents,
            price: format_cents_eur(product.price_cents),
            compare_at_price_cents: product.compare_at_price_cents,
            discount_percent,
            rating_avg: product.rating_avg,
            rating_count: product.rating_count,
            origin: product.origin,
            tags: product.tags,
            image,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    id: i64,
    slug: String,
    name: String,
    short_description: Option<String>,
    description: Option<String>,
    category: String,
    price_cents: i64,
    price: String,
    compare_at_price_cents: Option<i64>,
    compare_at_price: Option<String>,
    discount_percent: Option<i64>,
    origin: Option<String>,
    tags: Vec<String>,
    stock: Option<i64>,
    rating_avg: f32,
    rating_count: i64,
    images: Vec<ImageView>,
    variants: Vec<VariantView>,
    reviews: Vec<ReviewView>,
}

#[derive(Debug, Serialize)]
struct ImageView {
    url: String,
    alt: Option<String>,
}

/// Variant rows carry the resolved price, not just the modifier.
#[derive(Debug, Serialize)]
struct VariantView {
    id: i64,
    label: String,
    price_modifier_cents: i64,
    price_cents: i64,
    price: String,
    stock: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ReviewView {
    author: String,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Product> for ProductDetail {
    fn from(product: Product) -> Self {
        let variants = product
            .variants
            .iter()
            .map(|variant| {
                let price_cents = product.effective_price_cents(Some(variant));
                VariantView {
                    id: variant.id,
                    label: variant.label.clone(),
                    price_modifier_cents: variant.price_modifier_cents,
                    price_cents,
                    price: format_cents_eur(price_cents),
                    stock: variant.stock,
                }
            })
            .collect();
        let images = product
            .images
            .iter()
            .map(|image| ImageView {
                url: image.url.clone(),
                alt: image.alt.clone(),
            })
            .collect();
        let reviews = product
            .reviews
            .iter()
            .map(|review| ReviewView {
                author: review.author.clone(),
                rating: review.rating,
                comment: review.comment.clone(),
                created_at: review.created_at,
            })
            .collect();
        let discount_percent = product.discount_percent();

        Self {
            id: product.id,
            slug: product.slug,
            name: product.name,
            short_description: product.short_description,
            description: product.description,
            category: product.category_slug,
            price_cents: product.price_cents,
            price: format_cents_eur(product.price_cents),
            compare_at_price_cents: product.compare_at_price_cents,
            compare_at_price: product.compare_at_price_cents.map(format_cents_eur),
            discount_percent,
            origin: product.origin,
            tags: product.tags,
            stock: product.stock,
            rating_avg: product.rating_avg,
            rating_count: product.rating_count,
            images,
            variants,
            reviews,
        }
    }
}

pub(super) async fn search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(filters): Json<SearchFilters>,
) -> Result<Json<ApiResponse<Vec<ProductSummary>>>, ApiError> {
    // Landing state: nothing selected means an empty page, not a full table
    // scan, so the pool is never touched.
    if filters.is_empty() {
        return Ok(Json(ApiResponse {
            data: Vec::new(),
            meta: ResponseMeta::with_count(req_id.0, 0),
        }));
    }

    let products = qvtbox_db::search_products(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data: Vec<ProductSummary> = products.into_iter().map(ProductSummary::from).collect();
    let count = data.len();
    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::with_count(req_id.0, count),
    }))
}

pub(super) async fn product_detail(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let product = qvtbox_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| match e {
            qvtbox_db::DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no product with slug '{slug}'"),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse {
        data: ProductDetail::from(product),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct FeaturedParams {
    limit: Option<i64>,
}

pub(super) async fn featured(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<FeaturedParams>,
) -> Result<Json<ApiResponse<Vec<ProductSummary>>>, ApiError> {
    let limit = normalize_limit(params.limit);
    let products = qvtbox_db::list_newest_products(&state.pool, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data: Vec<ProductSummary> = products.into_iter().map(ProductSummary::from).collect();
    let count = data.len();
    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::with_count(req_id.0, count),
    }))
}
