//! `sherlock resolve` / `resolve-batch`: Google Shopping product ids for
//! products, with the resolver's memo tables persisted between runs.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use sherlock_core::AppConfig;
use sherlock_scraper::sources::google_shopping::DEFAULT_COUNTRIES;
use sherlock_scraper::{GoogleShoppingResolver, ProductQuery, ScrapeContext};

#[derive(Debug, Deserialize)]
struct ProductEntry {
    name: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    gtin: Option<String>,
    #[serde(default)]
    sku: Option<String>,
}

impl From<ProductEntry> for ProductQuery {
    fn from(entry: ProductEntry) -> Self {
        ProductQuery {
            name: entry.name,
            brand: entry.brand,
            gtin: entry.gtin,
            sku: entry.sku,
        }
    }
}

/// Reads a YAML list of products.
pub(crate) fn load_products(path: &Path) -> anyhow::Result<Vec<ProductQuery>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_products(&raw).with_context(|| format!("invalid product list {}", path.display()))
}

fn parse_products(raw: &str) -> anyhow::Result<Vec<ProductQuery>> {
    let entries: Vec<ProductEntry> = serde_yaml::from_str(raw)?;
    Ok(entries.into_iter().map(ProductQuery::from).collect())
}

fn markets(countries: &[String]) -> Vec<String> {
    if countries.is_empty() {
        DEFAULT_COUNTRIES.iter().map(|c| (*c).to_owned()).collect()
    } else {
        countries.iter().map(|c| c.trim().to_ascii_uppercase()).collect()
    }
}

/// Resolves each query in turn and prints one JSON line per product. The
/// snapshot is saved even when a lookup fails, so finished work is kept.
pub(crate) async fn run(
    config: AppConfig,
    queries: &[ProductQuery],
    countries: &[String],
) -> anyhow::Result<()> {
    let cache_dir = config.resolver_cache_dir.clone();
    let markets = markets(countries);
    let ctx = ScrapeContext::new(config)?;
    let resolver = GoogleShoppingResolver::load(&ctx, &cache_dir)?;

    let mut outcome = Ok(());
    for query in queries {
        match resolver.find_product_id_multiple_markets(query, &markets).await {
            Ok(found) => {
                let (product_id, country) = found.unzip();
                println!(
                    "{}",
                    json!({
                        "name": query.name,
                        "gtin": query.gtin,
                        "sku": query.sku,
                        "product_id": product_id,
                        "country": country,
                    })
                );
            }
            Err(e) => {
                tracing::error!(name = %query.name, error = %e, "product resolution failed");
                outcome = Err(e);
                break;
            }
        }
    }

    resolver
        .save(&cache_dir)
        .with_context(|| format!("failed to save resolver snapshot to {}", cache_dir.display()))?;
    outcome.map_err(Into::into)
}
