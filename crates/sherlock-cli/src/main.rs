mod resolve;
mod scrape;

use clap::{Parser, Subcommand};
use sherlock_core::Environment;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sherlock")]
#[command(about = "Live price-offer scraping and Google Shopping product resolution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one offer source for a product and print the published offers
    Scrape {
        /// Offer source tag: google_shopping, idealo, kelkoo, pricerunner, kuantokusta
        #[arg(long)]
        source: String,
        #[arg(long)]
        gtin: String,
        #[arg(long)]
        sku: Option<String>,
        /// Known locator, e.g. `idealo_DE=https://...`; an empty value marks a known miss
        #[arg(long = "offer-url", value_name = "KEY=VALUE", value_parser = scrape::parse_offer_url)]
        offer_urls: Vec<(String, Option<String>)>,
        /// Restrict the run to these countries (repeatable)
        #[arg(long = "country", value_name = "CC")]
        countries: Vec<String>,
        #[arg(long)]
        product_name: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        /// `triggered_by.source` of the event; Google Shopping only runs for `b2b_job`
        #[arg(long, default_value = "b2b_job")]
        triggered_by: String,
    },
    /// Resolve a Google Shopping product id for a product name and GTIN
    Resolve {
        #[arg(long)]
        name: String,
        #[arg(long)]
        gtin: Option<String>,
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        /// Markets to try in order (repeatable)
        #[arg(long = "country", value_name = "CC")]
        countries: Vec<String>,
    },
    /// Resolve every product listed in a YAML file
    ResolveBatch {
        /// YAML list of `{name, brand, gtin, sku}` entries
        #[arg(long)]
        products: std::path::PathBuf,
        #[arg(long = "country", value_name = "CC")]
        countries: Vec<String>,
    },
    /// Print the EAN-13 form of a GTIN
    Ean { gtin: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = sherlock_core::load_app_config()?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Scrape {
            source,
            gtin,
            sku,
            offer_urls,
            countries,
            product_name,
            brand,
            triggered_by,
        } => {
            let args = scrape::ScrapeArgs {
                source,
                gtin,
                sku,
                offer_urls,
                countries,
                product_name,
                brand,
                triggered_by,
            };
            scrape::run(config, args).await?;
        }
        Commands::Resolve {
            name,
            gtin,
            sku,
            brand,
            countries,
        } => {
            let query = sherlock_scraper::ProductQuery {
                name,
                brand,
                gtin,
                sku,
            };
            resolve::run(config, &[query], &countries).await?;
        }
        Commands::ResolveBatch {
            products,
            countries,
        } => {
            let queries = resolve::load_products(&products)?;
            resolve::run(config, &queries, &countries).await?;
        }
        Commands::Ean { gtin } => {
            println!("{}", sherlock_core::gtin_to_ean(&gtin)?);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable. Production renders
/// JSON lines.
fn init_tracing(config: &sherlock_core::AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if config.env == Environment::Production {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
