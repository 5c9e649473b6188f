//! Catalog search from the terminal, going through the same filter pipeline
//! as the storefront: flags become a [`FilterPatch`], the patch goes through
//! a [`FilterState`], and the resulting snapshot drives the query.

use qvtbox_core::filters::{FilterPatch, FilterState, Patch, PriceRange, SortKey};
use qvtbox_core::money::{format_cents_eur, parse_price_cents};

pub(crate) struct SearchArgs {
    pub query: Option<String>,
    pub category: Option<String>,
    pub origin: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rating: Option<f32>,
    pub tags: Vec<String>,
    pub sort: Option<SortKey>,
    pub limit: usize,
}

/// Lenient price flag parser: cents from `"20"`, `"20.50"` or `"20,50 €"`.
pub(crate) fn parse_price(raw: &str) -> Result<i64, String> {
    parse_price_cents(raw).ok_or_else(|| {
        format!("cannot parse '{raw}' as a price (try \"20\", \"20.50\" or \"20,50 €\")")
    })
}

pub(crate) fn parse_sort(raw: &str) -> Result<SortKey, String> {
    match raw {
        "name" => Ok(SortKey::Name),
        "price_asc" => Ok(SortKey::PriceAsc),
        "price_desc" => Ok(SortKey::PriceDesc),
        "rating" => Ok(SortKey::Rating),
        "newest" => Ok(SortKey::Newest),
        other => Err(format!(
            "unknown sort '{other}' (expected name, price_asc, price_desc, rating or newest)"
        )),
    }
}

fn build_patch(args: SearchArgs) -> FilterPatch {
    let price = if args.min_price.is_some() || args.max_price.is_some() {
        Patch::Set(PriceRange {
            min_cents: args.min_price,
            max_cents: args.max_price,
        })
    } else {
        Patch::Keep
    };
    let tags = if args.tags.is_empty() {
        Patch::Keep
    } else {
        Patch::Set(args.tags)
    };

    FilterPatch {
        query: Patch::set_or_keep(args.query),
        category: Patch::set_or_keep(args.category),
        price,
        min_rating: Patch::set_or_keep(args.min_rating),
        origin: Patch::set_or_keep(args.origin),
        sort: Patch::set_or_keep(args.sort),
        tags,
    }
}

/// Run a catalog search and print the matching rows as a table.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_search(pool: &sqlx::PgPool, args: SearchArgs) -> anyhow::Result<()> {
    let limit = args.limit;
    let mut state = FilterState::new();
    let filters = state.apply(build_patch(args));

    if filters.is_empty() {
        println!("no search criteria; pass at least one filter (see `search --help`)");
        return Ok(());
    }

    let products = qvtbox_db::search_products(pool, &filters).await?;

    if products.is_empty() {
        println!(
            "no products match ({} active criteria)",
            filters.active_count()
        );
        return Ok(());
    }

    let total = products.len();
    let header = format!(
        "{:<30}{:<14}{:>10}  {:<8}{:<14}TAGS",
        "NAME", "CATEGORY", "PRICE", "RATING", "ORIGIN"
    );
    println!("{header}");
    for product in products.iter().take(limit) {
        let name = truncate(&product.name, 27);
        let price = format_cents_eur(product.price_cents);
        let rating = format!("{:.1}", product.rating_avg);
        let origin = product.origin.as_deref().unwrap_or("\u{2014}");
        println!(
            "{:<30}{:<14}{:>10}  {:<8}{:<14}{}",
            name,
            product.category_slug,
            price,
            rating,
            origin,
            product.tags.join(", ")
        );
    }

    if total > limit {
        println!("({limit} of {total} rows shown; raise --limit to see more)");
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
