mod api;
mod cart_store;
mod middleware;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState, InFlightCheckouts},
    cart_store::CartStore,
};
use qvtbox_checkout::CheckoutClient;
use qvtbox_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = qvtbox_core::config::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = qvtbox_db::PoolConfig::from_app_config(&config);
    let pool = qvtbox_db::connect_pool(&config.database_url, pool_config).await?;
    qvtbox_db::run_migrations(&pool).await?;

    let carts = CartStore::default();
    let checkout = build_checkout_client(&config)?;

    let _scheduler = scheduler::build_scheduler(pool.clone(), carts.clone(), &config).await?;

    let state = AppState {
        pool,
        carts,
        checkout,
        in_flight: InFlightCheckouts::default(),
        checkout_max_retries: config.checkout_max_retries,
        public_base_url: config.public_base_url.clone(),
    };
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    // ConnectInfo feeds the per-client rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

fn build_checkout_client(config: &AppConfig) -> anyhow::Result<Option<Arc<CheckoutClient>>> {
    let Some(api_key) = config.checkout_api_key.as_deref() else {
        tracing::warn!("QVTBOX_CHECKOUT_API_KEY not set; checkout will answer 503");
        return Ok(None);
    };

    let client = match config.checkout_base_url.as_deref() {
        Some(base_url) => {
            CheckoutClient::with_base_url(api_key, config.checkout_timeout_secs, base_url)?
        }
        None => CheckoutClient::new(api_key, config.checkout_timeout_secs)?,
    };
    Ok(Some(Arc::new(client)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
