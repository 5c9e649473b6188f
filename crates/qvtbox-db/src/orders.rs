//! Database operations for checkout `orders`.
//!
//! An order row records a hosted-payment handoff, nothing more. Status starts
//! at `pending` and is never flipped to `paid` here: confirming payment needs
//! server-side verification against the provider, which this service does not
//! do. Stale pending rows are expired by the nightly sweep for bookkeeping.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub currency: String,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub items: Value,
    pub shipping_address: Value,
    pub billing_address: Option<Value>,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`insert_order`]. Amounts are cents; `items` and the addresses
/// are stored as JSON snapshots of what was sent to the provider.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub public_id: Uuid,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub items: Value,
    pub shipping_address: Value,
    pub billing_address: Option<Value>,
    /// Provider session id.
    pub payment_reference: String,
}

/// Inserts a `pending` order in EUR and returns its internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including on a duplicate
/// `public_id` or `payment_reference`.
pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders \
             (public_id, status, currency, subtotal_cents, shipping_cents, total_cents, \
              items, shipping_address, billing_address, payment_reference) \
         VALUES ($1, 'pending', 'EUR', $2, $3, $4, \
                 $5::jsonb, $6::jsonb, $7::jsonb, $8) \
         RETURNING id",
    )
    .bind(order.public_id)
    .bind(order.subtotal_cents)
    .bind(order.shipping_cents)
    .bind(order.total_cents)
    .bind(&order.items)
    .bind(&order.shipping_address)
    .bind(&order.billing_address)
    .bind(&order.payment_reference)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Looks up an order by its provider session id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_payment_reference(
    pool: &PgPool,
    payment_reference: &str,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT id, public_id, status, currency, subtotal_cents, shipping_cents, \
                total_cents, items, shipping_address, billing_address, \
                payment_reference, created_at, updated_at \
         FROM orders \
         WHERE payment_reference = $1",
    )
    .bind(payment_reference)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Flips `pending` orders older than the cutoff to `expired`.
///
/// Returns the number of rows updated. Purely bookkeeping: an expired row
/// says the handoff was never confirmed within the window, not that the
/// payment failed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn expire_stale_pending_orders(
    pool: &PgPool,
    older_than: Duration,
) -> Result<u64, DbError> {
    let cutoff = Utc::now() - older_than;

    let rows_affected = sqlx::query(
        "UPDATE orders \
         SET status = 'expired', updated_at = NOW() \
         WHERE status = 'pending' \
           AND created_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected)
}
