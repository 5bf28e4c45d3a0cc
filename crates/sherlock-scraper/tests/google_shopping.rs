//! Google Shopping offers pipeline against saved pages served by `wiremock`.

mod common;

use std::sync::Arc;

use serde_json::json;
use sherlock_core::{Offer, StockStatus};
use sherlock_scraper::sources::google_shopping::{self, parse_offer_page};
use sherlock_scraper::{FsHtmlDumper, PageOutcome, ScrapeRequest, ScraperError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{context, test_config, GTIN};

const PRODUCT_ID: &str = "3112645306492221763";
const VARIANT_0: &str = include_str!("fixtures/google_shopping/variant_0.html");
const VARIANT_1: &str = include_str!("fixtures/google_shopping/variant_1.html");
const NOT_FOUND: &str = include_str!("fixtures/google_shopping/not_found.html");
const EMPTY: &str = include_str!("fixtures/google_shopping/empty.html");
const SERVER_ERROR: &str = include_str!("fixtures/google_shopping/server_error.html");
const CONSENT: &str = include_str!("fixtures/google_shopping/consent.html");

fn offers_of(outcome: PageOutcome) -> Vec<Offer> {
    match outcome {
        PageOutcome::Offers(offers) => offers,
        other => panic!("expected offers, got {other:?}"),
    }
}

fn offers_path() -> String {
    format!("/shopping/product/{PRODUCT_ID}/offers")
}

// ---------------------------------------------------------------------------
// Parser fixtures
// ---------------------------------------------------------------------------

#[test]
fn table_layout_fixture_yields_exact_offers() {
    let offers = offers_of(parse_offer_page(VARIANT_0, "NL").unwrap());
    let metadata = Some(json!({
        "images": ["https://encrypted-tbn1.gstatic.com/shopping?q=tbn:ANd9GcS23black"]
    }));

    // The zero-priced MediaMarkt row and the sponsored row are dropped.
    assert_eq!(offers.len(), 2);
    assert_eq!(
        offers[0],
        Offer {
            offer_source: "google_shopping_NL".to_owned(),
            offer_url: "https://www.google.com/url?q=https://www.coolblue.nl/product/935281/samsung-galaxy-s23.html&sa=U&ved=0ahUKE".to_owned(),
            retail_prod_name: "Samsung Galaxy S23 128GB Phantom Black".to_owned(),
            retailer_name: "Coolblue".to_owned(),
            country: "NL".to_owned(),
            price: 74_900,
            currency: "EUR".to_owned(),
            stock_status: StockStatus::InStock,
            metadata: metadata.clone(),
        }
    );
    assert_eq!(
        offers[1],
        Offer {
            offer_source: "google_shopping_NL".to_owned(),
            offer_url: "https://www.google.com/url?q=https://www.bol.com/nl/nl/p/samsung-galaxy-s23/9300000140367117/&sa=U".to_owned(),
            retail_prod_name: "Samsung Galaxy S23 128GB Phantom Black".to_owned(),
            retailer_name: "bol.com".to_owned(),
            country: "NL".to_owned(),
            price: 102_999,
            currency: "EUR".to_owned(),
            stock_status: StockStatus::InStock,
            metadata,
        }
    );
}

#[test]
fn cards_layout_fixture_yields_exact_offers() {
    let offers = offers_of(parse_offer_page(VARIANT_1, "PL").unwrap());

    assert_eq!(offers.len(), 2);
    assert_eq!(
        offers[0],
        Offer {
            offer_source: "google_shopping_PL".to_owned(),
            offer_url: "https://www.x-kom.pl/p/607046-mysz-logitech-mx-anywhere-3-grafitowy.html"
                .to_owned(),
            retail_prod_name: "Logitech MX Anywhere 3 Graphite".to_owned(),
            retailer_name: "x-kom".to_owned(),
            country: "PL".to_owned(),
            price: 111_700,
            currency: "PLN".to_owned(),
            stock_status: StockStatus::InStock,
            metadata: None,
        }
    );
    assert_eq!(
        offers[1],
        Offer {
            offer_source: "google_shopping_PL".to_owned(),
            offer_url:
                "https://www.mediaexpert.pl/komputery-i-tablety/myszki/mysz-logitech-mx-anywhere-3"
                    .to_owned(),
            retail_prod_name: "Logitech MX Anywhere 3 Graphite".to_owned(),
            retailer_name: "Media Expert".to_owned(),
            country: "PL".to_owned(),
            price: 34_999,
            currency: "PLN".to_owned(),
            stock_status: StockStatus::InStock,
            metadata: None,
        }
    );
}

#[test]
fn parsing_is_idempotent() {
    assert_eq!(
        parse_offer_page(VARIANT_0, "NL").unwrap(),
        parse_offer_page(VARIANT_0, "NL").unwrap()
    );
    assert_eq!(
        parse_offer_page(VARIANT_1, "PL").unwrap(),
        parse_offer_page(VARIANT_1, "PL").unwrap()
    );
}

#[test]
fn not_found_marker_is_not_found() {
    assert_eq!(parse_offer_page(NOT_FOUND, "NL").unwrap(), PageOutcome::NotFound);
}

#[test]
fn empty_body_is_empty() {
    assert_eq!(parse_offer_page(EMPTY, "NL").unwrap(), PageOutcome::Empty);
}

#[test]
fn server_error_page_is_empty() {
    assert_eq!(parse_offer_page(SERVER_ERROR, "NL").unwrap(), PageOutcome::Empty);
}

#[test]
fn consent_interstitial_is_blocked() {
    let result = parse_offer_page(CONSENT, "NL");
    assert!(
        matches!(result, Err(ScraperError::Blocked { .. })),
        "expected Blocked, got: {result:?}"
    );
}

#[test]
fn unmapped_currency_aborts_the_page() {
    let html = VARIANT_0.replace("€749.00", "₿749.00");
    let result = parse_offer_page(&html, "NL");
    assert!(
        matches!(result, Err(ScraperError::Normalize(_))),
        "expected Normalize, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scrape_with_cached_id_collects_every_country() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(offers_path()))
        .and(query_param("gl", "nl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT_0))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(offers_path()))
        .and(query_param("gl", "pl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT_1))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL", "PL"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.offers.len(), 4);
    assert_eq!(report.offers[0].country, "NL");
    assert_eq!(report.offers[3].retailer_name, "Media Expert");
}

#[tokio::test]
async fn offers_request_carries_language_and_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(offers_path()))
        .and(query_param("hl", "en"))
        .and(query_param("uule", "w+CAIQICILTmV0aGVybGFuZHM="))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT_0))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL"]);
    let report = google_shopping::scrape(&ctx, &request).await;
    assert_eq!(report.offers.len(), 2);
}

#[tokio::test]
async fn missing_and_failing_pages_yield_no_offers_and_no_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("gl", "nl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("gl", "pl"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("gl", "be"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NOT_FOUND))
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL", "PL", "BE"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert!(report.offers.is_empty());
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
}

#[tokio::test]
async fn one_country_failing_does_not_block_the_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("gl", "nl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONSENT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("gl", "pl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT_1))
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL", "PL"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert_eq!(report.offers.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].country, "NL");
    assert!(matches!(report.errors[0].error, ScraperError::Blocked { .. }));
}

#[tokio::test]
async fn parse_failure_dumps_the_page() {
    let server = MockServer::start().await;
    let unknown = "<html><head><title>Shopping</title></head><body><div class=\"redesign\">x</div></body></html>";
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(unknown))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sink) = context(&server.uri(), test_config());
    let ctx = ctx.with_dumper(Arc::new(FsHtmlDumper::new(dir.path())));
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, ScraperError::ParseMismatch { .. }));
    let dumped = std::fs::read_to_string(
        dir.path()
            .join("google_shopping")
            .join(format!("{GTIN}_NL.html")),
    )
    .unwrap();
    assert_eq!(dumped, unknown);
}

#[tokio::test]
async fn known_missing_product_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT_0))
        .expect(0)
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let mut request = ScrapeRequest::new(GTIN).with_countries(&["NL"]);
    request.cached.insert("google_shopping".to_owned(), None);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert!(report.offers.is_empty());
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn unresolvable_locator_without_name_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (ctx, sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN).with_countries(&["NL"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert!(report.offers.is_empty());
    assert!(sink.offer_urls().is_empty());
}

#[tokio::test]
async fn rate_limited_country_reports_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let (ctx, _sink) = context(&server.uri(), test_config());
    let request = ScrapeRequest::new(GTIN)
        .with_cached("google_shopping", PRODUCT_ID)
        .with_countries(&["NL"]);
    let report = google_shopping::scrape(&ctx, &request).await;

    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, ScraperError::RateLimited { .. }));
}
