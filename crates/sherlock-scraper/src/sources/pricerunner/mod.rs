//! PriceRunner offers pipeline.
//!
//! PriceRunner hands out access cookies to browsers that behave like one, so
//! every country runs in its own cookie session: visit a page, pause, then
//! call the JSON API the page would call.

pub mod parser;

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use sherlock_core::Offer;

use crate::client::{absolute_url, HttpResponse, Session};
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::rate_limit::human_pause;
use crate::types::{retain_publishable, ScrapeReport, ScrapeRequest};

pub use parser::{first_product_path, listings_url, parse_listings};

pub const OFFER_SOURCE: &str = "pricerunner";

pub const COUNTRIES: &[&str] = &["SE", "DK"];

const ACCESS_CLICK_DELAY: Duration = Duration::from_millis(250);

/// Site origin for `country`, or the configured override.
#[must_use]
pub fn base_url(ctx: &ScrapeContext, country: &str) -> String {
    ctx.endpoints.pricerunner.clone().unwrap_or_else(|| {
        format!("https://www.pricerunner.{}", country.to_ascii_lowercase())
    })
}

/// Scrapes SE and DK (or the requested subset).
///
/// Cached `pricerunner_CC` paths are reused; otherwise the product is
/// searched by GTIN and the outcome is published to the locator sink.
pub async fn scrape(ctx: &ScrapeContext, request: &ScrapeRequest) -> ScrapeReport {
    let countries: Vec<String> = request
        .countries_or(COUNTRIES)
        .into_iter()
        .filter(|c| COUNTRIES.contains(&c.as_str()))
        .collect();

    let results: Vec<(String, Result<Vec<Offer>, ScraperError>)> = stream::iter(countries)
        .map(|country| async move {
            let result = scrape_country(ctx, request, &country).await;
            (country, result)
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
/// - [`ScraperError::Blocked`] when the access click-through does not lift
///   a 403.
/// - Transport, search-decoding and listings-parsing errors.
pub async fn scrape_country(
    ctx: &ScrapeContext,
    request: &ScrapeRequest,
    country: &str,
) -> Result<Vec<Offer>, ScraperError> {
    let key = format!("{OFFER_SOURCE}_{country}");
    let base = base_url(ctx, country);
    let session = ctx.transport.session(Some(country))?;

    let path = match request.cached_locator(&key) {
        Some(Some(path)) => {
            tracing::info!(gtin = %request.gtin, path, "reusing cached pricerunner path");
            Some(path.to_owned())
        }
        Some(None) => None,
        None => {
            let found = find_product_path(ctx, &session, &base, &request.gtin, country).await?;
            let mut urls = BTreeMap::new();
            urls.insert(key.clone(), found.clone());
            ctx.sink.publish_new_offer_urls(&request.gtin, &urls);
            found
        }
    };

    let Some(path) = path else {
        tracing::info!(gtin = %request.gtin, country, "no pricerunner product for gtin");
        return Ok(Vec::new());
    };

    let product_url = absolute_url(&base, &path);
    let offers = fetch_offers(ctx, &session, &base, &request.gtin, &product_url, country).await?;
    Ok(retain_publishable(&key, offers))
}

/// Home page, pause, then the search API.
async fn find_product_path(
    ctx: &ScrapeContext,
    session: &Session,
    base: &str,
    gtin: &str,
    country: &str,
) -> Result<Option<String>, ScraperError> {
    let offer_source = format!("{OFFER_SOURCE}_{country}");
    get_with_access(session, base, base, &offer_source).await?;
    pause(ctx).await;

    let search_url = format!(
        "{base}/public/search/v3/{}?q={gtin}",
        country.to_ascii_lowercase()
    );
    let response = get_with_access(session, base, &search_url, &offer_source).await?;
    if response.status == StatusCode::GONE {
        return Ok(None);
    }
    let results: parser::SearchResults = response
        .error_for_status()?
        .json("pricerunner search results")?;
    Ok(first_product_path(results))
}

/// Product page, pause, then the listings API.
async fn fetch_offers(
    ctx: &ScrapeContext,
    session: &Session,
    base: &str,
    gtin: &str,
    product_url: &str,
    country: &str,
) -> Result<Vec<Offer>, ScraperError> {
    let offer_source = format!("{OFFER_SOURCE}_{country}");
    get_with_access(session, base, product_url, &offer_source).await?;
    pause(ctx).await;

    let api_url = listings_url(base, product_url, country)?;
    let response = get_with_access(session, base, &api_url, &offer_source).await?;
    // Unknown products answer 204 rather than 404.
    if response.status == StatusCode::NO_CONTENT || response.status.as_u16() >= 400 {
        tracing::warn!(
            status = response.status.as_u16(),
            url = %api_url,
            "no pricerunner listings"
        );
        return Ok(Vec::new());
    }

    ctx.parse_or_dump(OFFER_SOURCE, gtin, country, &response.body, |body| {
        parse_listings(body, country, base)
    })
    .await
}

/// GET with the "I am not a robot" click-through: on 403, POST the access
/// endpoint, wait like the page script does, and try once more.
async fn get_with_access(
    session: &Session,
    base: &str,
    url: &str,
    offer_source: &str,
) -> Result<HttpResponse, ScraperError> {
    let response = get_retrying_timeout(session, url).await?;
    if response.status != StatusCode::FORBIDDEN {
        return Ok(log_gone(response));
    }

    tracing::warn!(url, "pricerunner answered 403, clicking through access check");
    session.post(&format!("{base}/public/access/v1")).await?;
    tokio::time::sleep(ACCESS_CLICK_DELAY).await;

    let response = get_retrying_timeout(session, url).await?;
    if response.status == StatusCode::FORBIDDEN {
        return Err(ScraperError::blocked(
            offer_source,
            "403 persists after access click-through",
        ));
    }
    Ok(log_gone(response))
}

async fn get_retrying_timeout(session: &Session, url: &str) -> Result<HttpResponse, ScraperError> {
    match session.get(url, None).await {
        Err(ScraperError::Http(e)) if e.is_timeout() => {
            tracing::warn!(url, "pricerunner request timed out, retrying once");
            session.get(url, None).await
        }
        other => other,
    }
}

fn log_gone(response: HttpResponse) -> HttpResponse {
    if response.status == StatusCode::GONE {
        tracing::warn!(url = %response.url, "pricerunner resource is no longer available");
    }
    response
}

async fn pause(ctx: &ScrapeContext) {
    human_pause(
        ctx.config.pricerunner_pause_min_secs,
        ctx.config.pricerunner_pause_max_secs,
    )
    .await;
}
