mod catalog;
mod search;


use std::path::PathBuf;

use clap::{Parser, Subcommand};

use qvtbox_core::filters::SortKey;

#[derive(Debug, Parser)]
#[command(name = "qvtbox-cli")]
#[command(about = "QVT Box catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load the YAML catalog into the database
    Seed {
        /// Path to the catalog file
        #[arg(long, default_value = "./config/catalog.yaml")]
        file: PathBuf,
        /// Assume the schema is already migrated
        #[arg(long)]
        skip_migrations: bool,
    },
    /// Query the catalog with the storefront filters
    Search {
        /// Full-text query against names and descriptions
        #[arg(long)]
        query: Option<String>,
        /// Category slug (e.g. detente)
        #[arg(long)]
        category: Option<String>,
        /// Origin, matched as a case-insensitive substring
        #[arg(long)]
        origin: Option<String>,
        /// Minimum price; accepts "20", "20.50" or "20,50 €"
        #[arg(long, value_parser = search::parse_price)]
        min_price: Option<i64>,
        /// Maximum price, same formats
        #[arg(long, value_parser = search::parse_price)]
        max_price: Option<i64>,
        /// Minimum average rating, 1.0 to 5.0
        #[arg(long)]
        min_rating: Option<f32>,
        /// Tag to match (repeatable; any match qualifies)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sort order: name, price_asc, price_desc, rating or newest
        #[arg(long, value_parser = search::parse_sort)]
        sort: Option<SortKey>,
        /// Maximum number of rows to print
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List the categories currently in the database
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Seed {
            file,
            skip_migrations,
        }) => {
            let pool = qvtbox_db::connect_pool_from_env().await?;
            catalog::run_seed(&pool, &file, skip_migrations).await
        }
        Some(Commands::Search {
            query,
            category,
            origin,
            min_price,
            max_price,
            min_rating,
            tags,
            sort,
            limit,
        }) => {
            let pool = qvtbox_db::connect_pool_from_env().await?;
            search::run_search(
                &pool,
                search::SearchArgs {
                    query,
                    category,
                    origin,
                    min_price,
                    max_price,
                    min_rating,
                    tags,
                    sort,
                    limit,
                },
            )
            .await
        }
        Some(Commands::Categories) => {
            let pool = qvtbox_db::connect_pool_from_env().await?;
            catalog::run_categories(&pool).await
        }
        None => {
            println!("qvtbox-cli: use `seed`, `search` or `categories` (see --help)");
            Ok(())
        }
    }
}
