//! Kelkoo publisher API: live offer search by EAN, no locator resolution.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use sherlock_core::{gtin_to_ean, minor_units_from_amount, normalize_iso_code, Offer, StockStatus};

use crate::client::RequestOptions;
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::types::{retain_publishable, ScrapeReport, ScrapeRequest};

pub const OFFER_SOURCE: &str = "kelkoo";

pub const COUNTRIES: &[&str] = &[
    "DE", "FR", "NO", "SE", "DK", "FI", "UK", "NL", "PL", "BE", "IE", "PT", "CZ", "CH", "GR",
    "SK",
];

const AVAILABILITY: &[(&str, StockStatus)] = &[
    ("in_stock", StockStatus::InStock),
    ("available_on_order", StockStatus::InStock),
    ("pre_order", StockStatus::OutOfStock),
    ("not_in_stock", StockStatus::OutOfStock),
    ("check_site", StockStatus::Unknown),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    offers: Vec<KelkooOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KelkooOffer {
    go_url: String,
    title: String,
    merchant: Named,
    price: f64,
    currency: String,
    #[serde(default)]
    availability_status: String,
    description: Option<String>,
    brand: Option<Named>,
    category: Option<Named>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    zoom_url: Option<String>,
}

/// Queries every requested country concurrently.
pub async fn scrape(ctx: &ScrapeContext, request: &ScrapeRequest) -> ScrapeReport {
    let Some(token) = ctx.config.kelkoo_jwt_token.as_deref() else {
        return ScrapeReport::from_error("ALL", ScraperError::MissingCredential("KELKOO_JWT_TOKEN"));
    };
    let ean = match gtin_to_ean(&request.gtin) {
        Ok(ean) => ean,
        Err(e) => return ScrapeReport::from_error("ALL", e.into()),
    };

    let results: Vec<(String, Result<Vec<Offer>, ScraperError>)> =
        stream::iter(request.countries_or(COUNTRIES))
            .map(|country| {
                let ean = ean.as_str();
                async move {
                    let result = fetch_offers(ctx, token, &country, ean).await;
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
    report
}

/// # Errors
///
/// - [`ScraperError::UnexpectedStatus`] on any non-200 answer.
/// - [`ScraperError::Deserialize`] when the body is not the expected JSON.
pub async fn fetch_offers(
    ctx: &ScrapeContext,
    token: &str,
    country: &str,
    ean: &str,
) -> Result<Vec<Offer>, ScraperError> {
    let url = format!(
        "{}/publisher/shopping/v2/search/offers?country={}&filterBy=codeEan:{ean}&additionalFields=merchantName,categoryName,description",
        ctx.endpoints.kelkoo,
        country.to_ascii_lowercase()
    );
    let options = RequestOptions {
        bearer_token: Some(token),
        accept: Some("application/json"),
        ..RequestOptions::default()
    };

    let response = ctx.transport.get(&url, options).await?;
    if !response.is_success() {
        if response.status.is_client_error() {
            tracing::error!(country, body = %response.body, "kelkoo request failed");
        }
        return Err(ScraperError::UnexpectedStatus {
            status: response.status.as_u16(),
            url: response.url,
        });
    }

    let result: SearchResponse = response.json("kelkoo offer search")?;
    let offer_source = format!("{OFFER_SOURCE}_{country}");
    let offers = parse_offers(result, country)?;
    Ok(retain_publishable(&offer_source, offers))
}

/// # Errors
///
/// Returns [`ScraperError::Normalize`] for a malformed currency code or price.
fn parse_offers(result: SearchResponse, country: &str) -> Result<Vec<Offer>, ScraperError> {
    result
        .offers
        .into_iter()
        .map(|offer| {
            let category: Vec<String> = offer
                .category
                .map(|c| c.name)
                .filter(|name| !name.is_empty())
                .into_iter()
                .collect();
            let images: Vec<String> = offer.images.into_iter().filter_map(|i| i.zoom_url).collect();

            Ok(Offer {
                offer_source: format!("{OFFER_SOURCE}_{country}"),
                offer_url: offer.go_url,
                retail_prod_name: offer.title,
                retailer_name: offer.merchant.name,
                country: country.to_owned(),
                price: minor_units_from_amount(offer.price)?,
                currency: normalize_iso_code(&offer.currency)?,
                stock_status: stock_status(&offer.availability_status),
                metadata: Some(json!({
                    "description": offer.description,
                    "brand": offer.brand.map(|b| b.name).unwrap_or_default(),
                    "category": category,
                    "images": images,
                })),
            })
        })
        .collect()
}

fn stock_status(raw: &str) -> StockStatus {
    StockStatus::lookup(AVAILABILITY, raw).unwrap_or_else(|| {
        tracing::warn!(kelkoo_availability_status = raw, "unknown availability status");
        StockStatus::Unknown
    })
}
