//! Idealo offers pipeline.
//!
//! Product ids come from the cache or from a PriceAPI lookup; each market
//! then has its own product page, with an alternate URL scheme tried when the
//! primary one does not answer 200.

pub mod parser;
pub mod priceapi;
pub mod rot47;

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use sherlock_core::Offer;

use crate::client::{last_path_segment, HttpResponse, RequestOptions};
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::types::{retain_publishable, PageOutcome, ScrapeReport, ScrapeRequest};

pub use parser::parse_offers_page;

pub const OFFER_SOURCE: &str = "idealo";

pub const COUNTRIES: &[&str] = &["DE", "UK", "ES", "IT", "FR", "AT"];

/// Idealo only answers consistently through a German egress.
const PROXY_COUNTRY: &str = "DE";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone, Copy)]
struct Market {
    country: &'static str,
    /// Host serving the product pages.
    host: &'static str,
    /// Origin the relative leadout links resolve against.
    link_origin: &'static str,
    product_path: &'static str,
    alternate_path: Option<&'static str>,
}

const MARKETS: &[Market] = &[
    Market {
        country: "DE",
        host: "https://www.idealo.de",
        link_origin: "https://www.idealo.de",
        product_path: "/preisvergleich/OffersOfProduct",
        alternate_path: Some("/preisvergleich/Typ"),
    },
    Market {
        country: "UK",
        host: "https://www.idealo.co.uk",
        link_origin: "https://www.idealo.co.uk",
        product_path: "/compare",
        alternate_path: Some("/type"),
    },
    Market {
        country: "ES",
        host: "https://www.idealo.es",
        link_origin: "https://www.idealo.es",
        product_path: "/precios",
        alternate_path: Some("/tipo"),
    },
    Market {
        country: "IT",
        host: "https://www.idealo.it",
        link_origin: "https://www.idealo.it",
        product_path: "/confronta-prezzi",
        alternate_path: Some("/tipo"),
    },
    Market {
        country: "FR",
        host: "https://www.idealo.fr",
        link_origin: "https://www.idealo.fr",
        product_path: "/prix",
        alternate_path: Some("/type"),
    },
    Market {
        country: "AT",
        host: "https://www.idealo.at",
        link_origin: "https://idealo.at",
        product_path: "/preisvergleich/OffersOfProduct",
        alternate_path: None,
    },
];

fn market(country: &str) -> Option<&'static Market> {
    MARKETS.iter().find(|m| m.country == country)
}

fn locator_key(country: &str) -> String {
    format!("{OFFER_SOURCE}_{country}")
}

/// Product page URL of `product_id` in `country`. `host_override` replaces
/// the market host (tests).
#[must_use]
pub fn product_url(product_id: &str, country: &str, host_override: Option<&str>) -> Option<String> {
    let market = market(country)?;
    let host = host_override.unwrap_or(market.host);
    Some(format!("{host}{}/{product_id}", market.product_path))
}

/// The alternate-scheme URL for the same product id, taken from the last
/// path segment of `url`. AT has no alternate scheme.
#[must_use]
pub fn alternate_url(url: &str, country: &str, host_override: Option<&str>) -> Option<String> {
    let market = market(country)?;
    let path = market.alternate_path?;
    let product_id = last_path_segment(url)?;
    let host = host_override.unwrap_or(market.host);
    Some(format!("{host}{path}/{product_id}"))
}

/// Scrapes every market with a known product URL.
///
/// Cached URLs are used as soon as any `idealo_CC` key is present, even if
/// all are `null`. Otherwise the product id is looked up through PriceAPI and
/// all six market URLs (or six `null`s) are published to the locator sink.
pub async fn scrape(ctx: &ScrapeContext, request: &ScrapeRequest) -> ScrapeReport {
    let urls = if has_cached_url(request) {
        cached_urls(request)
    } else {
        let found = find_product_urls(ctx, &request.gtin).await;
        ctx.sink.publish_new_offer_urls(&request.gtin, &found);
        found
    };

    let targets: Vec<(String, String)> = urls
        .into_iter()
        .filter_map(|(key, url)| {
            let country = key.strip_prefix("idealo_")?.to_owned();
            let wanted = request
                .countries
                .as_ref()
                .is_none_or(|cs| cs.iter().any(|c| *c == country));
            (wanted && market(&country).is_some()).then_some((country, url?))
        })
        .collect();

    if targets.is_empty() {
        tracing::info!(gtin = %request.gtin, "no idealo product url for gtin");
        return ScrapeReport::default();
    }

    let results: Vec<(String, Result<Vec<Offer>, ScraperError>)> = stream::iter(targets)
        .map(|(country, url)| async move {
            let result = scrape_country(ctx, &request.gtin, &country, &url).await;
            (country, result)
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
        "idealo scrape finished"
    );
    report
}

/// Fetches (with the alternate-URL fallback) and parses one market page.
///
/// # Errors
///
/// - [`ScraperError::UnexpectedStatus`] when both URLs fail with anything
///   but 410.
/// - [`ScraperError::Blocked`] on a captcha page.
/// - Parser errors from [`parse_offers_page`].
pub async fn scrape_country(
    ctx: &ScrapeContext,
    gtin: &str,
    country: &str,
    url: &str,
) -> Result<Vec<Offer>, ScraperError> {
    let offer_source = locator_key(country);
    let market = market(country).ok_or_else(|| {
        ScraperError::UnsupportedSource(offer_source.clone())
    })?;
    let host_override = ctx.endpoints.idealo.as_deref();
    let link_origin = host_override.unwrap_or(market.link_origin);

    let outcome = match fetch_with_fallback(ctx, url, country, host_override).await? {
        Some(response) => ctx.parse_or_dump(OFFER_SOURCE, gtin, country, &response.body, |body| {
            parse_offers_page(body, country, link_origin)
        })
        .await?,
        None => PageOutcome::Gone,
    };

    Ok(retain_publishable(
        &offer_source,
        outcome.into_offers(&offer_source, country),
    ))
}

/// `Ok(None)` means the product is gone (410).
async fn fetch_with_fallback(
    ctx: &ScrapeContext,
    url: &str,
    country: &str,
    host_override: Option<&str>,
) -> Result<Option<HttpResponse>, ScraperError> {
    let options = RequestOptions {
        proxy_country: Some(PROXY_COUNTRY),
        accept: Some(ACCEPT_HTML),
        ..RequestOptions::default()
    };

    let response = ctx.transport.get(url, options).await?;
    if response.status == StatusCode::OK {
        return Ok(Some(response));
    }

    let Some(alternate) = alternate_url(url, country, host_override) else {
        return gone_or_error(response);
    };
    tracing::warn!(
        status = response.status.as_u16(),
        url,
        alternate_url = %alternate,
        "error requesting idealo url, trying alternate url"
    );

    let response = ctx.transport.get(&alternate, options).await?;
    if response.status == StatusCode::OK {
        return Ok(Some(response));
    }
    gone_or_error(response)
}

fn gone_or_error(response: HttpResponse) -> Result<Option<HttpResponse>, ScraperError> {
    if response.status == StatusCode::GONE {
        return Ok(None);
    }
    Err(ScraperError::UnexpectedStatus {
        status: response.status.as_u16(),
        url: response.url,
    })
}

fn has_cached_url(request: &ScrapeRequest) -> bool {
    COUNTRIES
        .iter()
        .any(|country| request.cached.contains_key(&locator_key(country)))
}

fn cached_urls(request: &ScrapeRequest) -> BTreeMap<String, Option<String>> {
    COUNTRIES
        .iter()
        .filter_map(|country| {
            let key = locator_key(country);
            let url = request.cached_locator(&key)??.to_owned();
            Some((key, Some(url)))
        })
        .collect()
}

/// All six market URLs for the PriceAPI product id, or six `None`s when the
/// lookup fails or finds nothing.
async fn find_product_urls(ctx: &ScrapeContext, gtin: &str) -> BTreeMap<String, Option<String>> {
    tracing::info!(gtin, "no cached idealo url, searching on PriceAPI");
    let product_id = match priceapi::find_product_id(ctx, gtin, ctx.priceapi_poll).await {
        Ok(Some(id)) => Some(id),
        Ok(None) => {
            tracing::warn!(gtin, "cannot find idealo product id for product");
            None
        }
        Err(e) => {
            tracing::warn!(gtin, error = %e, "cannot find idealo product id for product");
            None
        }
    };

    COUNTRIES
        .iter()
        .map(|country| {
            let url = product_id
                .as_deref()
                .and_then(|id| product_url(id, country, ctx.endpoints.idealo.as_deref()));
            (locator_key(country), url)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_url_per_market() {
        assert_eq!(
            product_url("200557215", "DE", None).as_deref(),
            Some("https://www.idealo.de/preisvergleich/OffersOfProduct/200557215")
        );
        assert_eq!(
            product_url("200557215", "UK", None).as_deref(),
            Some("https://www.idealo.co.uk/compare/200557215")
        );
        assert_eq!(product_url("200557215", "SE", None), None);
    }

    #[test]
    fn alternate_url_reuses_product_id() {
        assert_eq!(
            alternate_url("https://www.idealo.it/confronta-prezzi/200557215", "IT", None)
                .as_deref(),
            Some("https://www.idealo.it/tipo/200557215")
        );
        assert_eq!(
            alternate_url(
                "http://127.0.0.1:9/preisvergleich/OffersOfProduct/42",
                "DE",
                Some("http://127.0.0.1:9")
            )
            .as_deref(),
            Some("http://127.0.0.1:9/preisvergleich/Typ/42")
        );
    }

    #[test]
    fn austria_has_no_alternate_url() {
        assert_eq!(
            alternate_url("https://www.idealo.at/preisvergleich/OffersOfProduct/1", "AT", None),
            None
        );
    }

    #[test]
    fn null_cached_entries_still_count_as_cached() {
        let mut request = ScrapeRequest::new("4002515289693");
        request.cached.insert("idealo_DE".to_owned(), None);
        assert!(has_cached_url(&request));
        assert!(cached_urls(&request).is_empty());
    }

    #[test]
    fn cached_urls_skip_other_sources() {
        let request = ScrapeRequest::new("4002515289693")
            .with_cached("idealo_FR", "https://www.idealo.fr/prix/1")
            .with_cached("google_shopping", "123");
        let urls = cached_urls(&request);
        assert_eq!(urls.len(), 1);
        assert_eq!(
            urls.get("idealo_FR"),
            Some(&Some("https://www.idealo.fr/prix/1".to_owned()))
        );
    }
}
