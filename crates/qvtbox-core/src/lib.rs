//! Domain core for the QVT Box storefront: money, filters, carts, products,
//! the assistant classifier, catalog-file ingestion, and app configuration.
//!
//! Everything here is pure and synchronous; IO lives in the db, checkout,
//! and server crates.

pub mod app_config;
pub mod cart;
pub mod catalog_file;
pub mod config;
pub mod error;
pub mod filters;
pub mod intent;
pub mod money;
pub mod products;
pub mod session;

pub use app_config::{AppConfig, Environment};
pub use cart::{Cart, CartLine, LineKey, NewLine};
pub use error::{CatalogFileError, ConfigError};
pub use filters::{FilterPatch, FilterState, Patch, PriceRange, SearchFilters, SortKey};
pub use products::{Product, ProductImage, ProductReview, ProductVariant};
pub use session::{SearchRequest, SearchSession};
