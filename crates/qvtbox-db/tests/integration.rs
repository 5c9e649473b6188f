//! Offline unit tests for qvtbox-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use qvtbox_core::{AppConfig, Environment};
use qvtbox_db::{NewOrder, OrderRow, PoolConfig, ProductRow};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        catalog_path: PathBuf::from("./config/catalog.yaml"),
        checkout_base_url: None,
        checkout_api_key: None,
        checkout_timeout_secs: 30,
        checkout_max_retries: 1,
        cart_ttl_minutes: 120,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`ProductRow`] has all expected
/// fields with the correct types, and that the conversion to the core read
/// model carries them over. No database required.
#[test]
fn product_row_converts_to_core_product() {
    let row = ProductRow {
        id: 42,
        slug: "box-energie".to_string(),
        name: "Box Énergie".to_string(),
        short_description: Some("Un coup de fouet pour l'équipe.".to_string()),
        description: None,
        category_slug: "nutrition".to_string(),
        price_cents: 29_90,
        compare_at_price_cents: None,
        origin: Some("France".to_string()),
        tags: vec!["bio".to_string(), "vitalite".to_string()],
        stock: Some(18),
        rating_avg: 4.2,
        rating_count: 5,
        is_active: true,
        created_at: Utc::now(),
    };

    let product = row.into_product(vec![], vec![], vec![]);

    assert_eq!(product.id, 42);
    assert_eq!(product.slug, "box-energie");
    assert_eq!(product.category_slug, "nutrition");
    assert_eq!(product.price_cents, 29_90);
    assert_eq!(product.tags.len(), 2);
    assert_eq!(product.stock, Some(18));
    assert!(product.is_active);
    assert!(product.images.is_empty());
}

/// Compile-time smoke test: confirm that [`OrderRow`] and [`NewOrder`] have
/// all expected fields with the correct types. No database required.
#[test]
fn order_row_has_expected_fields() {
    let row = OrderRow {
        id: 1,
        public_id: Uuid::new_v4(),
        status: "pending".to_string(),
        currency: "EUR".to_string(),
        subtotal_cents: 64_80,
        shipping_cents: 5_90,
        total_cents: 70_70,
        items: json!([{ "name": "Box Sérénité", "quantity": 1 }]),
        shipping_address: json!({ "city": "Lyon" }),
        billing_address: None,
        payment_reference: "cs_test_abc".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.status, "pending");
    assert_eq!(row.currency, "EUR");
    assert_eq!(row.total_cents, row.subtotal_cents + row.shipping_cents);
    assert!(row.billing_address.is_none());

    let order = NewOrder {
        public_id: row.public_id,
        subtotal_cents: row.subtotal_cents,
        shipping_cents: row.shipping_cents,
        total_cents: row.total_cents,
        items: row.items.clone(),
        shipping_address: row.shipping_address.clone(),
        billing_address: None,
        payment_reference: row.payment_reference.clone(),
    };
    assert_eq!(order.payment_reference, "cs_test_abc");
}
