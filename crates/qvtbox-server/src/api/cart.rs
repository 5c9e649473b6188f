//! Cart endpoints. Every mutation answers with the full recomputed cart view
//! so the storefront never has to derive totals itself.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qvtbox_core::cart::{Cart, CartLine, LineKey, NewLine};
use qvtbox_core::money::{format_cents_eur, missing_for_free_shipping_cents};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct CreatedCart {
    cart_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedCart {
    deleted: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CartLineView {
    product_id: i64,
    variant_id: Option<i64>,
    name: String,
    variant_label: Option<String>,
    origin: Option<String>,
    category: Option<String>,
    unit_price_cents: i64,
    unit_price: String,
    quantity: u32,
    line_total_cents: i64,
    line_total: String,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.key.product_id,
            variant_id: line.key.variant_id,
            name: line.name.clone(),
            variant_label: line.variant_label.clone(),
            origin: line.origin.clone(),
            category: line.category.clone(),
            unit_price_cents: line.unit_price_cents,
            unit_price: format_cents_eur(line.unit_price_cents),
            quantity: line.quantity,
            line_total_cents: line.line_total_cents(),
            line_total: format_cents_eur(line.line_total_cents()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CartView {
    cart_id: Uuid,
    lines: Vec<CartLineView>,
    total_items: u64,
    subtotal_cents: i64,
    subtotal: String,
    shipping_cents: i64,
    shipping: String,
    total_cents: i64,
    total: String,
    free_shipping: bool,
    missing_for_free_shipping_cents: i64,
}

impl CartView {
    pub(super) fn from_cart(cart_id: Uuid, cart: &Cart) -> Self {
        let subtotal_cents = cart.subtotal_cents();
        let shipping_cents = cart.shipping_cents();
        let total_cents = cart.total_with_shipping_cents();
        Self {
            cart_id,
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            total_items: cart.total_items(),
            subtotal_cents,
            subtotal: format_cents_eur(subtotal_cents),
            shipping_cents,
            shipping: format_cents_eur(shipping_cents),
            total_cents,
            total: format_cents_eur(total_cents),
            free_shipping: cart.qualifies_for_free_shipping(),
            missing_for_free_shipping_cents: missing_for_free_shipping_cents(subtotal_cents),
        }
    }
}

fn cart_not_found(request_id: String, cart_id: Uuid) -> ApiError {
    ApiError::new(
        request_id,
        "cart_not_found",
        format!("no cart with id {cart_id}"),
    )
}

pub(super) async fn create_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<CreatedCart>>) {
    let cart_id = state.carts.create();
    tracing::debug!(%cart_id, "cart created");
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CreatedCart { cart_id },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let cart = state
        .carts
        .snapshot(cart_id)
        .ok_or_else(|| cart_not_found(req_id.0.clone(), cart_id))?;

    Ok(Json(ApiResponse {
        data: CartView::from_cart(cart_id, &cart),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
) -> Json<ApiResponse<DeletedCart>> {
    let deleted = state.carts.remove(cart_id);
    Json(ApiResponse {
        data: DeletedCart { deleted },
        meta: ResponseMeta::new(req_id.0),
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct AddItemRequest {
    product_slug: String,
    variant_id: Option<i64>,
    quantity: Option<u32>,
}

pub(super) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let quantity = body.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "quantity must be at least 1",
        ));
    }

    // Prices always come from the live catalog, never from the request.
    let product = qvtbox_db::get_product_by_slug(&state.pool, &body.product_slug)
        .await
        .map_err(|e| match e {
            qvtbox_db::DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no product with slug '{}'", body.product_slug),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    let variant = match body.variant_id {
        Some(variant_id) => Some(product.variant(variant_id).ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "validation_error",
                format!(
                    "unknown variant {variant_id} for product '{}'",
                    body.product_slug
                ),
            )
        })?),
        None => None,
    };

    let line = NewLine {
        key: LineKey {
            product_id: product.id,
            variant_id: body.variant_id,
        },
        name: product.name.clone(),
        variant_label: variant.map(|v| v.label.clone()),
        unit_price_cents: product.effective_price_cents(variant),
        origin: product.origin.clone(),
        category: Some(product.category_slug.clone()),
    };

    let view = state
        .carts
        .with_cart(cart_id, |cart| {
            cart.add(line, quantity);
            CartView::from_cart(cart_id, cart)
        })
        .ok_or_else(|| cart_not_found(req_id.0.clone(), cart_id))?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateItemRequest {
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i64,
}

pub(super) async fn update_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let key = LineKey {
        product_id: body.product_id,
        variant_id: body.variant_id,
    };
    let view = state
        .carts
        .with_cart(cart_id, |cart| {
            cart.update_quantity(key, body.quantity);
            CartView::from_cart(cart_id, cart)
        })
        .ok_or_else(|| cart_not_found(req_id.0.clone(), cart_id))?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoveItemRequest {
    product_id: i64,
    variant_id: Option<i64>,
}

pub(super) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
    Json(body): Json<RemoveItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let key = LineKey {
        product_id: body.product_id,
        variant_id: body.variant_id,
    };
    let view = state
        .carts
        .with_cart(cart_id, |cart| {
            cart.remove(key);
            CartView::from_cart(cart_id, cart)
        })
        .ok_or_else(|| cart_not_found(req_id.0.clone(), cart_id))?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}
