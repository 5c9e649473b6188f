use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window request limiter, one window per client IP.
///
/// Requests with no resolvable peer address (in-process test calls) share
/// a single fallback window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<HashMap<Option<IpAddr>, RateLimitWindow>>>,
}

/// Cap on tracked client windows; expired ones are pruned past this point.
const MAX_TRACKED_CLIENTS: usize = 10_000;

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request for `client`; `false` means the window is full.
    pub(crate) async fn try_acquire(&self, client: Option<IpAddr>) -> bool {
        let mut windows = self.state.lock().await;

        if windows.len() > MAX_TRACKED_CLIENTS {
            let window = self.window;
            windows.retain(|_, w| w.started_at.elapsed() < window);
        }

        let entry = windows.entry(client).or_insert_with(|| RateLimitWindow {
            started_at: Instant::now(),
            count: 0,
        });

        if entry.started_at.elapsed() >= self.window {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing the per-client request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    if rate_limit.try_acquire(client).await {
        return next.run(req).await;
    }

    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(MiddlewareErrorBody {
            error: MiddlewareError {
                code: "rate_limited",
                message: "rate limit exceeded",
            },
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last_octet: u8) -> Option<IpAddr> {
        Some(IpAddr::from([10, 0, 0, last_octet]))
    }

    #[tokio::test]
    async fn window_fills_up_then_refuses() {
        let state = RateLimitState::new(2, Duration::from_secs(60));
        assert!(state.try_acquire(ip(1)).await);
        assert!(state.try_acquire(ip(1)).await);
        assert!(!state.try_acquire(ip(1)).await);
    }

    #[tokio::test]
    async fn clients_are_limited_independently() {
        let state = RateLimitState::new(1, Duration::from_secs(60));
        assert!(state.try_acquire(ip(1)).await);
        assert!(!state.try_acquire(ip(1)).await);
        assert!(state.try_acquire(ip(2)).await);
        assert!(state.try_acquire(None).await);
    }

    #[tokio::test]
    async fn an_expired_window_resets_the_count() {
        let state = RateLimitState::new(1, Duration::ZERO);
        assert!(state.try_acquire(ip(1)).await);
        assert!(state.try_acquire(ip(1)).await);
    }
}
