//! Checkout orchestration: validate, guard against double submits, open the
//! provider session, record a pending order, hand back the redirect URL.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use qvtbox_checkout::{
    retry_with_backoff, Address, CheckoutItem, SessionMetadata, SessionRequest,
    ALLOWED_SHIPPING_COUNTRIES,
};
use qvtbox_core::cart::Cart;
use qvtbox_db::NewOrder;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const CHECKOUT_BACKOFF_BASE_MS: u64 = 500;

/// Cart ids with a checkout underway. A slot is held for the whole provider
/// round trip and released when the guard drops, whatever the outcome.
#[derive(Clone, Default)]
pub struct InFlightCheckouts {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightCheckouts {
    /// Claims the cart, or `None` when a checkout for it is already running.
    fn begin(&self, cart_id: Uuid) -> Option<InFlightSlot> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.insert(cart_id) {
            Some(InFlightSlot {
                held: Arc::clone(&self.held),
                cart_id,
            })
        } else {
            None
        }
    }
}

struct InFlightSlot {
    held: Arc<Mutex<HashSet<Uuid>>>,
    cart_id: Uuid,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.cart_id);
    }
}

fn default_billing_same() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutRequest {
    cart_id: Uuid,
    shipping_address: Address,
    #[serde(default = "default_billing_same")]
    billing_same_as_shipping: bool,
    billing_address: Option<Address>,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutStarted {
    checkout_url: String,
    session_id: String,
    /// Public id of the pending order, when the record could be written.
    order_id: Option<Uuid>,
}

/// Collects every address problem into one message naming the fields.
fn validation_message(body: &CheckoutRequest) -> Option<String> {
    let mut problems = Vec::new();

    let missing = body.shipping_address.validate();
    if !missing.is_empty() {
        problems.push(format!(
            "shipping_address is missing {}",
            missing.join(", ")
        ));
    }
    let country = body.shipping_address.country.trim().to_uppercase();
    if !country.is_empty() && !ALLOWED_SHIPPING_COUNTRIES.contains(&country.as_str()) {
        problems.push(format!("shipping country '{country}' is not served"));
    }

    if !body.billing_same_as_shipping {
        match &body.billing_address {
            None => problems.push(
                "billing_address is required when billing_same_as_shipping is false".to_string(),
            ),
            Some(billing) => {
                let missing = billing.validate();
                if !missing.is_empty() {
                    problems.push(format!(
                        "billing_address is missing {}",
                        missing.join(", ")
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}

fn build_session_request(
    cart: &Cart,
    shipping_address: Address,
    billing_address: Option<Address>,
    public_base_url: &str,
    cart_id: Uuid,
) -> SessionRequest {
    let items = cart
        .lines()
        .iter()
        .map(|line| CheckoutItem {
            name: match &line.variant_label {
                Some(label) => format!("{} ({label})", line.name),
                None => line.name.clone(),
            },
            unit_amount_cents: line.unit_price_cents,
            quantity: line.quantity,
        })
        .collect();
    let base = public_base_url.trim_end_matches('/');

    SessionRequest {
        items,
        shipping_address,
        billing_address,
        shipping_cents: cart.shipping_cents(),
        automatic_tax: true,
        allowed_countries: ALLOWED_SHIPPING_COUNTRIES
            .iter()
            .map(ToString::to_string)
            .collect(),
        // The provider substitutes the session placeholder on redirect.
        success_url: format!(
            "{base}/api/v1/checkout/success?cart_id={cart_id}&session_id={{CHECKOUT_SESSION_ID}}"
        ),
        cancel_url: format!("{base}/api/v1/checkout/cancel?cart_id={cart_id}"),
        metadata: SessionMetadata {
            source: "qvtbox-storefront".to_string(),
            item_count: cart.total_items(),
        },
    }
}

/// Best-effort bookkeeping. The provider session already exists, so a failed
/// insert is logged and the redirect still goes out.
async fn record_order(
    pool: &PgPool,
    cart: &Cart,
    session_id: &str,
    shipping: &Address,
    billing: Option<&Address>,
) -> Option<Uuid> {
    let items: Vec<serde_json::Value> = cart
        .lines()
        .iter()
        .map(|line| {
            json!({
                "product_id": line.key.product_id,
                "variant_id": line.key.variant_id,
                "name": line.name,
                "variant_label": line.variant_label,
                "unit_price_cents": line.unit_price_cents,
                "quantity": line.quantity,
            })
        })
        .collect();

    let shipping_address = match serde_json::to_value(shipping) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, %session_id, "order record skipped: address not serializable");
            return None;
        }
    };
    let billing_address = match billing.map(serde_json::to_value).transpose() {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, %session_id, "order record skipped: address not serializable");
            return None;
        }
    };

    let order = NewOrder {
        public_id: Uuid::new_v4(),
        subtotal_cents: cart.subtotal_cents(),
        shipping_cents: cart.shipping_cents(),
        total_cents: cart.total_with_shipping_cents(),
        items: serde_json::Value::Array(items),
        shipping_address,
        billing_address,
        payment_reference: session_id.to_string(),
    };

    match qvtbox_db::insert_order(pool, &order).await {
        Ok(id) => {
            tracing::debug!(order_id = id, %session_id, "pending order recorded");
            Some(order.public_id)
        }
        Err(e) => {
            tracing::error!(error = %e, %session_id, "order record failed; checkout continues");
            None
        }
    }
}

pub(super) async fn start_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutStarted>>, ApiError> {
    let cart = state.carts.snapshot(body.cart_id).ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "cart_not_found",
            format!("no cart with id {}", body.cart_id),
        )
    })?;
    if cart.is_empty() {
        return Err(ApiError::new(req_id.0, "validation_error", "cart is empty"));
    }
    if let Some(message) = validation_message(&body) {
        return Err(ApiError::new(req_id.0, "validation_error", message));
    }

    // Held until this handler returns; dropping it frees the cart for the
    // next submit.
    let _slot = state.in_flight.begin(body.cart_id).ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "checkout_in_flight",
            "a checkout for this cart is already in progress",
        )
    })?;

    let Some(client) = state.checkout.clone() else {
        return Err(ApiError::new(
            req_id.0,
            "checkout_unavailable",
            "checkout is not configured on this deployment",
        ));
    };

    let billing_address = if body.billing_same_as_shipping {
        None
    } else {
        body.billing_address.clone()
    };
    let request = build_session_request(
        &cart,
        body.shipping_address.clone(),
        billing_address,
        &state.public_base_url,
        body.cart_id,
    );

    let session = retry_with_backoff(state.checkout_max_retries, CHECKOUT_BACKOFF_BASE_MS, || {
        client.create_session(&request)
    })
    .await
    .map_err(|e| {
        tracing::error!(cart_id = %body.cart_id, error = %e, "checkout session failed");
        ApiError::new(
            req_id.0.clone(),
            "payment_error",
            "the payment provider could not start a checkout session",
        )
    })?;

    let order_id = record_order(
        &state.pool,
        &cart,
        &session.session_id,
        &body.shipping_address,
        request.billing_address.as_ref(),
    )
    .await;

    tracing::info!(
        cart_id = %body.cart_id,
        session_id = %session.session_id,
        total_cents = cart.total_with_shipping_cents(),
        "checkout session created"
    );

    Ok(Json(ApiResponse {
        data: CheckoutStarted {
            checkout_url: session.checkout_url,
            session_id: session.session_id,
            order_id,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SuccessParams {
    cart_id: Uuid,
    session_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutOutcome {
    session_id: String,
    cart_cleared: bool,
    order_recorded: bool,
}

/// Return URL after the provider confirms. Clears the cart, nothing more:
/// payment truth stays with the provider, so no order is marked paid here.
pub(super) async fn checkout_success(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SuccessParams>,
) -> Json<ApiResponse<CheckoutOutcome>> {
    let cart_cleared = state.carts.clear_cart(params.cart_id);

    let order_recorded =
        match qvtbox_db::get_order_by_payment_reference(&state.pool, &params.session_id).await {
            Ok(row) => row.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, session_id = %params.session_id, "order lookup failed on success return");
                false
            }
        };

    tracing::info!(
        cart_id = %params.cart_id,
        session_id = %params.session_id,
        cart_cleared,
        "checkout success return"
    );

    Json(ApiResponse {
        data: CheckoutOutcome {
            session_id: params.session_id,
            cart_cleared,
            order_recorded,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct CancelParams {
    cart_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct CancelOutcome {
    cart_preserved: bool,
    total_items: u64,
}

pub(super) async fn checkout_cancel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<CancelParams>,
) -> Json<ApiResponse<CancelOutcome>> {
    let snapshot = state.carts.snapshot(params.cart_id);
    Json(ApiResponse {
        data: CancelOutcome {
            cart_preserved: snapshot.is_some(),
            total_items: snapshot.map_or(0, |cart| cart.total_items()),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}
