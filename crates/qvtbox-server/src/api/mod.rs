mod assist;
mod cart;
mod catalog;
mod checkout;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::cart_store::CartStore;
use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};
use qvtbox_checkout::CheckoutClient;

pub use checkout::InFlightCheckouts;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub carts: CartStore,
    /// `None` when no provider key is configured; checkout then answers 503.
    pub checkout: Option<Arc<CheckoutClient>>,
    pub in_flight: InFlightCheckouts,
    pub checkout_max_retries: u32,
    pub public_base_url: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    service: &'static str,
    version: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            count: None,
        }
    }

    pub(super) fn with_count(request_id: String, count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::new(request_id)
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" | "cart_not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "checkout_in_flight" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "payment_error" => StatusCode::BAD_GATEWAY,
            "checkout_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Featured-rail page size: defaults to 8, never more than 50.
pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(8).clamp(1, 50)
}

pub(super) fn map_db_error(request_id: String, error: &qvtbox_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "database_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn storefront_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/catalog/search", post(catalog::search))
        .route("/api/v1/catalog/products/{slug}", get(catalog::product_detail))
        .route("/api/v1/catalog/featured", get(catalog::featured))
        .route("/api/v1/carts", post(cart::create_cart))
        .route(
            "/api/v1/carts/{cart_id}",
            get(cart::get_cart).delete(cart::delete_cart),
        )
        .route(
            "/api/v1/carts/{cart_id}/items",
            post(cart::add_item)
                .patch(cart::update_item)
                .delete(cart::remove_item),
        )
        .route("/api/v1/checkout", post(checkout::start_checkout))
        .route("/api/v1/checkout/success", get(checkout::checkout_success))
        .route("/api/v1/checkout/cancel", get(checkout::checkout_cancel))
        .route("/api/v1/assist", post(assist::assist))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(storefront_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match qvtbox_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    service: "qvtbox-server",
                    version: env!("CARGO_PKG_VERSION"),
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        service: "qvtbox-server",
                        version: env!("CARGO_PKG_VERSION"),
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(pool: sqlx::PgPool) -> AppState {
        AppState {
            pool,
            carts: CartStore::default(),
            checkout: None,
            in_flight: InFlightCheckouts::default(),
            checkout_max_retries: 1,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }

    fn checkout_state(pool: sqlx::PgPool, provider_url: &str) -> AppState {
        let client = CheckoutClient::with_base_url("test-key", 5, provider_url)
            .expect("client construction should not fail");
        AppState {
            checkout: Some(Arc::new(client)),
            ..test_state(pool)
        }
    }

    fn test_app(state: AppState) -> Router {
        build_app(state, default_rate_limit_state())
    }

    async fn read_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json parse")
        };
        (status, json)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        read_json(response).await
    }

    async fn send_json(
        app: Router,
        http_method: &str,
        uri: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(json_request(http_method, uri, body))
            .await
            .expect("response");
        read_json(response).await
    }

    fn json_request(http_method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(http_method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    // -------------------------------------------------------------------------
    // Seeding helpers (direct SQL, mirroring the migration defaults)
    // -------------------------------------------------------------------------

    async fn seed_category(pool: &sqlx::PgPool, slug: &str, name: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO categories (slug, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(slug)
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("seed_category failed")
    }

    async fn seed_product(
        pool: &sqlx::PgPool,
        category_id: i64,
        slug: &str,
        name: &str,
        price_cents: i64,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO products (slug, name, category_id, price_cents, origin) \
             VALUES ($1, $2, $3, $4, 'France') RETURNING id",
        )
        .bind(slug)
        .bind(name)
        .bind(category_id)
        .bind(price_cents)
        .fetch_one(pool)
        .await
        .expect("seed_product failed")
    }

    async fn seed_variant(
        pool: &sqlx::PgPool,
        product_id: i64,
        label: &str,
        price_modifier_cents: i64,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO product_variants (product_id, label, price_modifier_cents) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(product_id)
        .bind(label)
        .bind(price_modifier_cents)
        .fetch_one(pool)
        .await
        .expect("seed_variant failed")
    }

    /// One category, one 45,00 € product with a +15,00 € variant.
    async fn seed_storefront(pool: &sqlx::PgPool) -> i64 {
        let category_id = seed_category(pool, "detente", "Détente").await;
        let product_id = seed_product(pool, category_id, "box-serenite", "Box Sérénité", 45_00).await;
        seed_variant(pool, product_id, "Formule duo", 15_00).await;
        product_id
    }

    async fn create_cart_with_item(app: &Router, quantity: u32) -> Uuid {
        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/carts", &serde_json::json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        let cart_id: Uuid = body["data"]["cart_id"]
            .as_str()
            .expect("cart_id")
            .parse()
            .expect("uuid");

        let (status, _) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-serenite", "quantity": quantity }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        cart_id
    }

    fn checkout_body(cart_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "cart_id": cart_id,
            "shipping_address": {
                "full_name": "Claire Morel",
                "line1": "12 rue des Lilas",
                "city": "Lyon",
                "postal_code": "69003",
                "country": "FR",
                "email": "claire@entreprise.fr"
            }
        })
    }

    async fn mount_provider_success(server: &MockServer, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": session_id,
                "checkout_url": format!("https://pay.qvtbox.com/s/{session_id}")
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    // -------------------------------------------------------------------------
    // Envelope and helpers (no DB)
    // -------------------------------------------------------------------------

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 8);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 50);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn error_codes_map_to_their_statuses() {
        let cases = [
            ("validation_error", StatusCode::BAD_REQUEST),
            ("not_found", StatusCode::NOT_FOUND),
            ("cart_not_found", StatusCode::NOT_FOUND),
            ("checkout_in_flight", StatusCode::CONFLICT),
            ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
            ("payment_error", StatusCode::BAD_GATEWAY),
            ("checkout_unavailable", StatusCode::SERVICE_UNAVAILABLE),
            ("database_error", StatusCode::INTERNAL_SERVER_ERROR),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, expected) in cases {
            let response = ApiError::new("req-1", code, "message").into_response();
            assert_eq!(response.status(), expected, "code {code}");
        }
    }

    #[test]
    fn meta_count_is_omitted_unless_set() {
        let plain = serde_json::to_value(ResponseMeta::new("req-1".to_string())).expect("meta");
        assert!(plain.get("count").is_none());

        let counted =
            serde_json::to_value(ResponseMeta::with_count("req-1".to_string(), 3)).expect("meta");
        assert_eq!(counted["count"].as_u64(), Some(3));
    }

    // -------------------------------------------------------------------------
    // Health and middleware
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_service_identity(pool: sqlx::PgPool) {
        let app = test_app(test_state(pool));
        let (status, body) = get_json(app, "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"].as_str(), Some("ok"));
        assert_eq!(body["data"]["database"].as_str(), Some("ok"));
        assert_eq!(body["data"]["service"].as_str(), Some("qvtbox-server"));
        assert!(body["data"]["version"].as_str().is_some_and(|v| !v.is_empty()));
        assert!(body["meta"]["request_id"].as_str().is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn supplied_request_id_is_echoed_back(pool: sqlx::PgPool) {
        let app = test_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-from-client-42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response.headers().get("x-request-id").map(|v| v.to_str().map_err(|_| ())),
            Some(Ok("req-from-client-42"))
        );
        let (_, body) = read_json(response).await;
        assert_eq!(body["meta"]["request_id"].as_str(), Some("req-from-client-42"));
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn search_finds_seeded_products_and_counts_them(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));

        let (status, body) = send_json(
            app,
            "POST",
            "/api/v1/catalog/search",
            &serde_json::json!({ "category": "detente" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["slug"].as_str(), Some("box-serenite"));
        assert_eq!(data[0]["price_cents"].as_i64(), Some(45_00));
        assert_eq!(data[0]["price"].as_str(), Some("45,00 €"));
        assert_eq!(body["meta"]["count"].as_u64(), Some(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn search_with_empty_filters_is_an_empty_page(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));

        let (status, body) =
            send_json(app, "POST", "/api/v1/catalog/search", &serde_json::json!({})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
        assert_eq!(body["meta"]["count"].as_u64(), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn search_by_text_matches_the_name(pool: sqlx::PgPool) {
        let category_id = seed_category(&pool, "nutrition", "Nutrition").await;
        seed_product(&pool, category_id, "infusion-relaxante", "Infusion relaxante", 12_90).await;
        seed_product(&pool, category_id, "corbeille-fruits", "Corbeille de fruits", 19_90).await;
        let app = test_app(test_state(pool));

        let (status, body) = send_json(
            app,
            "POST",
            "/api/v1/catalog/search",
            &serde_json::json!({ "query": "infusion" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["slug"].as_str(), Some("infusion-relaxante"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn product_detail_returns_the_full_graph(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));

        let (status, body) = get_json(app, "/api/v1/catalog/products/box-serenite").await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["slug"].as_str(), Some("box-serenite"));
        assert_eq!(data["category"].as_str(), Some("detente"));
        assert_eq!(data["price_cents"].as_i64(), Some(45_00));

        let variants = data["variants"].as_array().expect("variants");
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0]["label"].as_str(), Some("Formule duo"));
        assert_eq!(variants[0]["price_cents"].as_i64(), Some(60_00));
        assert_eq!(variants[0]["price"].as_str(), Some("60,00 €"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_product_detail_is_404(pool: sqlx::PgPool) {
        let app = test_app(test_state(pool));
        let (status, body) = get_json(app, "/api/v1/catalog/products/absente").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"].as_str(), Some("not_found"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn featured_returns_newest_first_with_clamped_limit(pool: sqlx::PgPool) {
        let category_id = seed_category(&pool, "detente", "Détente").await;
        seed_product(&pool, category_id, "box-un", "Box Un", 10_00).await;
        seed_product(&pool, category_id, "box-deux", "Box Deux", 20_00).await;
        seed_product(&pool, category_id, "box-trois", "Box Trois", 30_00).await;
        let app = test_app(test_state(pool));

        let (status, body) = get_json(app, "/api/v1/catalog/featured?limit=2").await;

        assert_eq!(status, StatusCode::OK);
        let slugs: Vec<&str> = body["data"]
            .as_array()
            .expect("data array")
            .iter()
            .filter_map(|p| p["slug"].as_str())
            .collect();
        // Insertion order matches id order; id breaks any created_at ties.
        assert_eq!(slugs, vec!["box-trois", "box-deux"]);
    }

    // -------------------------------------------------------------------------
    // Carts
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn cart_lifecycle_tracks_totals_and_shipping(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));

        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/carts", &serde_json::json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        let cart_id = body["data"]["cart_id"].as_str().expect("cart_id").to_string();

        let (status, body) = get_json(app.clone(), &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_items"].as_u64(), Some(0));
        assert_eq!(body["data"]["subtotal_cents"].as_i64(), Some(0));
        assert_eq!(body["data"]["shipping_cents"].as_i64(), Some(0));
        assert_eq!(body["data"]["free_shipping"].as_bool(), Some(false));

        // One 45,00 € box: under the 80,00 € bar, flat fee applies.
        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-serenite" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_items"].as_u64(), Some(1));
        assert_eq!(body["data"]["subtotal_cents"].as_i64(), Some(45_00));
        assert_eq!(body["data"]["shipping_cents"].as_i64(), Some(5_90));
        assert_eq!(body["data"]["total_cents"].as_i64(), Some(50_90));
        assert_eq!(body["data"]["free_shipping"].as_bool(), Some(false));
        assert_eq!(
            body["data"]["missing_for_free_shipping_cents"].as_i64(),
            Some(35_00)
        );

        // Two of them crosses the bar.
        let product_id = body["data"]["lines"][0]["product_id"].as_i64().expect("product_id");
        let (status, body) = send_json(
            app.clone(),
            "PATCH",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_id": product_id, "quantity": 2 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["subtotal_cents"].as_i64(), Some(90_00));
        assert_eq!(body["data"]["shipping_cents"].as_i64(), Some(0));
        assert_eq!(body["data"]["free_shipping"].as_bool(), Some(true));
        assert_eq!(body["data"]["missing_for_free_shipping_cents"].as_i64(), Some(0));

        let (status, body) = send_json(
            app.clone(),
            "DELETE",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_id": product_id }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_items"].as_u64(), Some(0));
        assert_eq!(body["data"]["lines"].as_array().map(Vec::len), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn a_variant_forms_its_own_cart_line(pool: sqlx::PgPool) {
        let product_id = seed_storefront(&pool).await;
        let variant_id: i64 = sqlx::query_scalar("SELECT id FROM product_variants WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&pool)
            .await
            .expect("variant id");
        let app = test_app(test_state(pool));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-serenite", "variant_id": variant_id }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let lines = body["data"]["lines"].as_array().expect("lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["variant_label"].as_str(), Some("Formule duo"));
        assert_eq!(lines[1]["unit_price_cents"].as_i64(), Some(60_00));
        assert_eq!(body["data"]["subtotal_cents"].as_i64(), Some(105_00));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn cart_item_endpoints_validate_their_input(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));

        let ghost = Uuid::new_v4();
        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{ghost}/items"),
            &serde_json::json!({ "product_slug": "box-serenite" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"].as_str(), Some("cart_not_found"));

        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-inconnue" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"].as_str(), Some("not_found"));

        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-serenite", "variant_id": 9_999 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"].as_str(), Some("validation_error"));

        let (status, body) = send_json(
            app.clone(),
            "POST",
            &format!("/api/v1/carts/{cart_id}/items"),
            &serde_json::json!({ "product_slug": "box-serenite", "quantity": 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn deleting_a_cart_drops_it(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) = send_json(
            app.clone(),
            "DELETE",
            &format!("/api/v1/carts/{cart_id}"),
            &serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"].as_bool(), Some(true));

        let (status, body) = get_json(app.clone(), &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"].as_str(), Some("cart_not_found"));

        let (status, body) = send_json(
            app,
            "DELETE",
            &format!("/api/v1/carts/{cart_id}"),
            &serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"].as_bool(), Some(false));
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn checkout_validates_before_needing_a_provider(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        // No provider configured: validation failures must still answer
        // as validation failures, not as 503.
        let app = test_app(test_state(pool));

        let ghost = Uuid::new_v4();
        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/checkout", &checkout_body(ghost)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"].as_str(), Some("cart_not_found"));

        let (status, body) = send_json(
            app.clone(),
            "POST",
            "/api/v1/carts",
            &serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let empty_cart: Uuid = body["data"]["cart_id"]
            .as_str()
            .expect("cart_id")
            .parse()
            .expect("uuid");
        let (status, body) = send_json(
            app.clone(),
            "POST",
            "/api/v1/checkout",
            &checkout_body(empty_cart),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("empty")));

        let cart_id = create_cart_with_item(&app, 1).await;
        let mut body_missing = checkout_body(cart_id);
        body_missing["shipping_address"]["full_name"] = serde_json::json!("");
        body_missing["shipping_address"]["postal_code"] = serde_json::json!("  ");
        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/checkout", &body_missing).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"]["message"].as_str().expect("message");
        assert!(message.contains("full_name"), "got: {message}");
        assert!(message.contains("postal_code"), "got: {message}");

        let mut body_billing = checkout_body(cart_id);
        body_billing["billing_same_as_shipping"] = serde_json::json!(false);
        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/checkout", &body_billing).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("billing_address")));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn checkout_without_a_provider_is_503(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) =
            send_json(app, "POST", "/api/v1/checkout", &checkout_body(cart_id)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"].as_str(), Some("checkout_unavailable"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn full_checkout_redirects_and_records_a_pending_order(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let server = MockServer::start().await;
        mount_provider_success(&server, "cs_test_ok").await;
        let app = test_app(checkout_state(pool.clone(), &server.uri()));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/checkout", &checkout_body(cart_id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["session_id"].as_str(), Some("cs_test_ok"));
        assert_eq!(
            body["data"]["checkout_url"].as_str(),
            Some("https://pay.qvtbox.com/s/cs_test_ok")
        );
        assert!(body["data"]["order_id"].as_str().is_some());

        let order = qvtbox_db::get_order_by_payment_reference(&pool, "cs_test_ok")
            .await
            .expect("order lookup")
            .expect("order row");
        assert_eq!(order.status, "pending");
        assert_eq!(order.subtotal_cents, 45_00);
        assert_eq!(order.shipping_cents, 5_90);
        assert_eq!(order.total_cents, 50_90);

        // Submitting does not clear the cart; only the success return does.
        let (_, body) = get_json(app.clone(), &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(body["data"]["total_items"].as_u64(), Some(1));

        let success_uri =
            format!("/api/v1/checkout/success?cart_id={cart_id}&session_id=cs_test_ok");
        let (status, body) = get_json(app.clone(), &success_uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cart_cleared"].as_bool(), Some(true));
        assert_eq!(body["data"]["order_recorded"].as_bool(), Some(true));

        let (_, body) = get_json(app.clone(), &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(body["data"]["total_items"].as_u64(), Some(0));

        // The return URL can be hit any number of times.
        let (status, body) = get_json(app.clone(), &success_uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cart_cleared"].as_bool(), Some(true));

        // The order is bookkeeping only; nothing here marks it paid.
        let order = qvtbox_db::get_order_by_payment_reference(&pool, "cs_test_ok")
            .await
            .expect("order lookup")
            .expect("order row");
        assert_eq!(order.status, "pending");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn concurrent_submits_reach_the_provider_once(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "session_id": "cs_race",
                        "checkout_url": "https://pay.qvtbox.com/s/cs_race"
                    }))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let app = test_app(checkout_state(pool, &server.uri()));
        let cart_id = create_cart_with_item(&app, 1).await;

        let first = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/checkout", &checkout_body(cart_id)));
        let second = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/checkout", &checkout_body(cart_id)));
        let (first, second) = tokio::join!(first, second);

        let mut statuses = vec![
            first.expect("response").status(),
            second.expect("response").status(),
        ];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn provider_outage_maps_to_payment_error_and_keeps_the_cart(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let app = test_app(checkout_state(pool, &server.uri()));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) =
            send_json(app.clone(), "POST", "/api/v1/checkout", &checkout_body(cart_id)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"].as_str(), Some("payment_error"));

        let requests = server.received_requests().await.expect("recorded requests");
        assert_eq!(requests.len(), 2, "one attempt plus the configured retry");

        let (_, body) = get_json(app.clone(), &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(body["data"]["total_items"].as_u64(), Some(1));

        // The guard slot was released: a later submit reaches the provider again.
        let (status, _) =
            send_json(app, "POST", "/api/v1/checkout", &checkout_body(cart_id)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn a_success_without_redirect_url_is_a_payment_error(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let server = MockServer::start().await;
        // Malformed success is not transient, so exactly one provider call.
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "session_id": "cs_broken" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let app = test_app(checkout_state(pool, &server.uri()));
        let cart_id = create_cart_with_item(&app, 1).await;

        let (status, body) =
            send_json(app, "POST", "/api/v1/checkout", &checkout_body(cart_id)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"].as_str(), Some("payment_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn cancel_preserves_the_cart(pool: sqlx::PgPool) {
        seed_storefront(&pool).await;
        let app = test_app(test_state(pool));
        let cart_id = create_cart_with_item(&app, 2).await;

        let (status, body) = get_json(
            app.clone(),
            &format!("/api/v1/checkout/cancel?cart_id={cart_id}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cart_preserved"].as_bool(), Some(true));
        assert_eq!(body["data"]["total_items"].as_u64(), Some(2));

        let (_, body) = get_json(app, &format!("/api/v1/carts/{cart_id}")).await;
        assert_eq!(body["data"]["total_items"].as_u64(), Some(2));
    }

    // -------------------------------------------------------------------------
    // Assist
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn assist_answers_deterministically(pool: sqlx::PgPool) {
        let app = test_app(test_state(pool));
        let question = serde_json::json!({ "message": "Combien coûte la box détente ?" });

        let (status, first) =
            send_json(app.clone(), "POST", "/api/v1/assist", &question).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["intent"].as_str(), Some("pricing"));
        assert!(first["data"]["reply"]
            .as_str()
            .is_some_and(|r| r.contains("80 €")));

        let (_, second) = send_json(app.clone(), "POST", "/api/v1/assist", &question).await;
        assert_eq!(first["data"], second["data"]);

        let (_, greeting) = send_json(
            app,
            "POST",
            "/api/v1/assist",
            &serde_json::json!({ "message": "Bonjour !" }),
        )
        .await;
        assert_eq!(greeting["data"]["intent"].as_str(), Some("greeting"));
    }
}
