//! Catalog maintenance commands: seeding and category listing.
//!
//! These are called from `main` once the database pool is established. The
//! YAML file is validated before anything touches the database, so a broken
//! file never leaves a half-seeded catalog behind.

use std::path::Path;

use qvtbox_core::catalog_file::load_catalog;

/// Seed the database from the YAML catalog file.
///
/// Loads and validates the file (prices are parsed leniently, with warnings
/// for malformed values), runs migrations unless told otherwise, then
/// upserts everything in one transaction and prints the summary.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or validated, migrations
/// fail, or the seed transaction fails.
pub(crate) async fn run_seed(
    pool: &sqlx::PgPool,
    file: &Path,
    skip_migrations: bool,
) -> anyhow::Result<()> {
    let catalog = load_catalog(file)
        .map_err(|e| anyhow::anyhow!("cannot load catalog {}: {e}", file.display()))?;
    tracing::debug!(
        categories = catalog.categories.len(),
        products = catalog.products.len(),
        "catalog file loaded"
    );

    if !skip_migrations {
        qvtbox_db::run_migrations(pool).await?;
    }

    let summary = qvtbox_db::seed_catalog(pool, &catalog).await?;
    println!(
        "seeded {} categories and {} products from {}",
        summary.categories,
        summary.products,
        file.display()
    );
    Ok(())
}

/// List the categories currently in the database.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_categories(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = qvtbox_db::list_categories(pool).await?;

    if categories.is_empty() {
        println!("no categories found; run `seed` first");
        return Ok(());
    }

    let header = format!("{:<20}NAME", "SLUG");
    println!("{header}");
    for category in &categories {
        println!("{:<20}{}", category.slug, category.name);
    }

    Ok(())
}
