//! Google Shopping offers pipeline: one offers page per country for a cached
//! (or freshly resolved) Google product id.

pub mod parser;
pub mod uule;

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use sherlock_core::Offer;

use crate::client::RequestOptions;
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::resolver::{GoogleShoppingResolver, ProductQuery};
use crate::types::{retain_publishable, PageOutcome, ScrapeReport, ScrapeRequest};

pub use parser::{parse_offer_page, Layout};

pub const OFFER_SOURCE: &str = "google_shopping";

/// Markets scraped when the caller does not name any.
pub const DEFAULT_COUNTRIES: &[&str] = &[
    "NL", "PL", "BE", "IE", "PT", "CZ", "CH", "GR", "SK", "RO", "HU",
];

/// Scrapes the offers page of every requested country concurrently.
///
/// A missing locator is resolved through the variant-walk search when the
/// request carries a product name; the outcome, hit or miss, is published to
/// the locator sink.
pub async fn scrape(ctx: &ScrapeContext, request: &ScrapeRequest) -> ScrapeReport {
    let countries = request.countries_or(DEFAULT_COUNTRIES);

    let product_id = match request.cached_locator(OFFER_SOURCE) {
        Some(Some(id)) => id.to_owned(),
        Some(None) => {
            tracing::info!(gtin = %request.gtin, "google shopping product known to be missing");
            return ScrapeReport::default();
        }
        None => match resolve_locator(ctx, request, &countries).await {
            Ok(Some(id)) => id,
            Ok(None) => return ScrapeReport::default(),
            Err(e) => return ScrapeReport::from_error("ALL", e),
        },
    };

    let results: Vec<(String, Result<Vec<Offer>, ScraperError>)> = stream::iter(countries)
        .map(|country| {
            let product_id = product_id.as_str();
            async move {
                let result = scrape_country(ctx, &request.gtin, product_id, &country).await;
                (country, result)
            }
        })
        .buffered(ctx.config.max_concurrent_countries.max(1))
        .collect()
        .await;

    let mut report = ScrapeReport::default();
    for (country, result) in results {
        report.push_result(&country, result);
    }
    tracing::info!(
        gtin = %request.gtin,
        offers = report.offers.len(),
        errors = report.errors.len(),
        "google shopping scrape finished"
    );
    report
}

/// Fetches and parses the offers page of `product_id` for one country.
///
/// # Errors
///
/// Transport errors, `Blocked` on consent pages, `ParseMismatch` on unknown
/// layouts and page-fatal currency errors.
pub async fn scrape_country(
    ctx: &ScrapeContext,
    gtin: &str,
    product_id: &str,
    country: &str,
) -> Result<Vec<Offer>, ScraperError> {
    let offer_source = format!("{OFFER_SOURCE}_{country}");
    let url = offers_url(&ctx.endpoints.google, product_id, country);

    if ctx.config.inter_request_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(ctx.config.inter_request_delay_ms)).await;
    }
    let response = ctx.transport.get(&url, RequestOptions::via(country)).await?;

    let outcome = if response.status == StatusCode::NOT_FOUND {
        PageOutcome::NotFound
    } else if response.status.is_server_error() {
        PageOutcome::Empty
    } else {
        let response = response.error_for_status()?;
        ctx.parse_or_dump(OFFER_SOURCE, gtin, country, &response.body, |body| {
            parse_offer_page(body, country)
        })
        .await?
    };

    Ok(retain_publishable(
        &offer_source,
        outcome.into_offers(&offer_source, country),
    ))
}

#[must_use]
pub fn offers_url(base: &str, product_id: &str, country: &str) -> String {
    let mut url = format!(
        "{base}/shopping/product/{product_id}/offers?hl=en&gl={}",
        country.to_ascii_lowercase()
    );
    if let Some(uule) = uule::encoded_uule_for(country) {
        url.push_str("&uule=");
        url.push_str(&uule);
    }
    url
}

async fn resolve_locator(
    ctx: &ScrapeContext,
    request: &ScrapeRequest,
    countries: &[String],
) -> Result<Option<String>, ScraperError> {
    let Some(name) = request.product_name.as_deref() else {
        tracing::warn!(gtin = %request.gtin, "no google shopping product id provided");
        return Ok(None);
    };

    let query = ProductQuery {
        name: name.to_owned(),
        brand: request.brand.clone(),
        gtin: Some(request.gtin.clone()),
        sku: request.sku.clone(),
    };
    let resolver = GoogleShoppingResolver::new(ctx);
    let found = resolver
        .find_product_id_multiple_markets(&query, countries)
        .await?;
    let product_id = found.map(|(id, _country)| id);

    let mut urls = BTreeMap::new();
    urls.insert(OFFER_SOURCE.to_owned(), product_id.clone());
    ctx.sink.publish_new_offer_urls(&request.gtin, &urls);

    Ok(product_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_url_carries_locale_and_uule() {
        assert_eq!(
            offers_url("https://www.google.com", "3112645306492221763", "NL"),
            "https://www.google.com/shopping/product/3112645306492221763/offers?hl=en&gl=nl&uule=w%2BCAIQICILTmV0aGVybGFuZHM%3D"
        );
    }

    #[test]
    fn offers_url_without_uule_for_unknown_country() {
        assert_eq!(
            offers_url("http://127.0.0.1:1", "1", "US"),
            "http://127.0.0.1:1/shopping/product/1/offers?hl=en&gl=us"
        );
    }
}
