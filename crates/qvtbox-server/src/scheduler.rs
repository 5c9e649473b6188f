//! Background housekeeping jobs.
//!
//! Two recurring jobs run alongside the API: an idle-cart sweep every ten
//! minutes and a nightly pass that expires stale pending orders. Both log
//! and continue on failure; neither touches payment state.

use std::time::Duration;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use qvtbox_core::AppConfig;

use crate::cart_store::CartStore;

/// Pending orders older than this are bookkeeping noise, not payments.
const PENDING_ORDER_MAX_AGE_HOURS: i64 = 24;

/// Builds and starts the scheduler. The returned handle must be kept alive
/// for the lifetime of the process; dropping it stops the jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised or a
/// job cannot be registered.
pub async fn build_scheduler(
    pool: PgPool,
    carts: CartStore,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let cart_ttl = Duration::from_secs(config.cart_ttl_minutes.saturating_mul(60));

    register_cart_sweep_job(&scheduler, carts, cart_ttl).await?;
    register_order_expiry_job(&scheduler, pool).await?;

    scheduler.start().await?;
    tracing::info!(
        cart_ttl_minutes = config.cart_ttl_minutes,
        "housekeeping scheduler started"
    );
    Ok(scheduler)
}

/// Every ten minutes, on the minute.
async fn register_cart_sweep_job(
    scheduler: &JobScheduler,
    carts: CartStore,
    ttl: Duration,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let carts = carts.clone();
        Box::pin(async move {
            run_cart_sweep(&carts, ttl);
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

/// Nightly at 03:30 UTC, after the provider's own session expiry window.
async fn register_order_expiry_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 30 3 * * *", move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            run_order_expiry(&pool).await;
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

fn run_cart_sweep(carts: &CartStore, ttl: Duration) {
    if carts.is_empty() {
        return;
    }
    let evicted = carts.sweep_idle(ttl);
    if evicted > 0 {
        tracing::info!(
            evicted,
            remaining = carts.len(),
            "cart sweep: idle carts evicted"
        );
    }
}

async fn run_order_expiry(pool: &PgPool) {
    let max_age = chrono::Duration::hours(PENDING_ORDER_MAX_AGE_HOURS);
    match qvtbox_db::expire_stale_pending_orders(pool, max_age).await {
        Ok(0) => {}
        Ok(expired) => tracing::info!(expired, "order expiry: stale pending orders closed"),
        Err(e) => tracing::error!(error = %e, "order expiry failed"),
    }
}
