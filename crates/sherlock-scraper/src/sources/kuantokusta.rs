//! KuantoKusta (Portugal): search by EAN, then read the offers from the
//! product page's embedded Next.js data.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sherlock_core::{gtin_to_ean, minor_units_from_amount, Offer, StockStatus};

use crate::client::{absolute_url, RequestOptions};
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::types::{retain_publishable, PageOutcome, ScrapeReport, ScrapeRequest};

pub const OFFER_SOURCE: &str = "kuantokusta";
const COUNTRY: &str = "PT";
const CURRENCY: &str = "EUR";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static EMPTY_RESULTS: LazyLock<Selector> = LazyLock::new(|| selector(".products-empty"));
static PRODUCT_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-item a.product-item-image"));
static NEXT_DATA: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script#__NEXT_DATA__[type="application/json"]"#));

#[derive(Debug, Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Debug, Deserialize)]
struct Props {
    #[serde(rename = "pageProps")]
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    product_page: ProductPage,
    product_page_features: Option<Features>,
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    product: Product,
    #[serde(default)]
    breadcrumb: Vec<Crumb>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    offers: Vec<StoreOffer>,
    #[serde(default)]
    images: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreOffer {
    business_rules: BusinessRules,
    product_name: String,
    store_name: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct BusinessRules {
    cpc: Cpc,
}

#[derive(Debug, Deserialize)]
struct Cpc {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Crumb {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Features {
    description: Option<String>,
    #[serde(default)]
    features_group: Vec<FeatureGroup>,
}

#[derive(Debug, Deserialize)]
struct FeatureGroup {
    name: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
    value: Value,
}

pub async fn scrape(ctx: &ScrapeContext, request: &ScrapeRequest) -> ScrapeReport {
    let mut report = ScrapeReport::default();
    report.push_result(COUNTRY, fetch_offers(ctx, &request.gtin).await);
    report
}

/// # Errors
///
/// - [`ScraperError::Normalize`] for a GTIN longer than 14 digits.
/// - [`ScraperError::ParseMismatch`] / [`ScraperError::Deserialize`] when
///   the search or product page no longer matches the parser.
/// - Transport errors and non-2xx statuses.
pub async fn fetch_offers(ctx: &ScrapeContext, gtin: &str) -> Result<Vec<Offer>, ScraperError> {
    let ean = gtin_to_ean(gtin)?;
    let root = ctx.endpoints.kuantokusta.as_str();

    let search = ctx
        .transport
        .get(&format!("{root}/search?q={ean}"), RequestOptions::default())
        .await?
        .error_for_status()?;
    let Some(product_url) = ctx.parse_or_dump(OFFER_SOURCE, gtin, COUNTRY, &search.body, |body| {
        parse_search_page(body, root)
    })
    .await?
    else {
        return Ok(PageOutcome::NotFound.into_offers(OFFER_SOURCE, COUNTRY));
    };

    let page = ctx
        .transport
        .get(&product_url, RequestOptions::default())
        .await?
        .error_for_status()?;
    let offers = ctx.parse_or_dump(OFFER_SOURCE, gtin, COUNTRY, &page.body, parse_product_page)
        .await?;
    Ok(retain_publishable(OFFER_SOURCE, offers))
}

/// Absolute URL of the first search hit; `None` on the empty-results page.
///
/// # Errors
///
/// Returns [`ScraperError::ParseMismatch`] when results are shown but no
/// product link is found.
pub fn parse_search_page(html: &str, root: &str) -> Result<Option<String>, ScraperError> {
    let document = Html::parse_document(html);
    if document.select(&EMPTY_RESULTS).next().is_some() {
        return Ok(None);
    }
    let href = document
        .select(&PRODUCT_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| ScraperError::parse_mismatch(OFFER_SOURCE, "no product link in search results"))?;
    Ok(Some(absolute_url(root, href)))
}

/// Offers from the `__NEXT_DATA__` document of a product page. Every offer
/// carries the product's category, description, images and spec tables.
///
/// # Errors
///
/// - [`ScraperError::ParseMismatch`] without a `__NEXT_DATA__` script.
/// - [`ScraperError::Deserialize`] when the script is not the expected shape.
pub fn parse_product_page(html: &str) -> Result<Vec<Offer>, ScraperError> {
    let document = Html::parse_document(html);
    let script: String = document
        .select(&NEXT_DATA)
        .next()
        .map(|s| s.text().collect())
        .ok_or_else(|| ScraperError::parse_mismatch(OFFER_SOURCE, "no __NEXT_DATA__ script"))?;
    let data: NextData = serde_json::from_str(&script).map_err(|e| ScraperError::Deserialize {
        context: "kuantokusta __NEXT_DATA__".to_owned(),
        source: e,
    })?;

    let page_props = data.props.page_props;
    let product_page = page_props.product_page;
    let features = page_props.product_page_features;

    // The last crumb is the product itself.
    let crumbs = product_page.breadcrumb.len().saturating_sub(1);
    let category: Vec<String> = product_page
        .breadcrumb
        .into_iter()
        .take(crumbs)
        .map(|c| c.name)
        .collect();
    let description = features
        .as_ref()
        .and_then(|f| f.description.as_deref())
        .map(html_to_text)
        .unwrap_or_default();
    let specs: Map<String, Value> = features
        .map(|f| f.features_group)
        .unwrap_or_default()
        .into_iter()
        .map(|group| {
            let table: Map<String, Value> =
                group.features.into_iter().map(|f| (f.name, f.value)).collect();
            (group.name, Value::Object(table))
        })
        .collect();
    let metadata = json!({
        "category": category,
        "description": description,
        "images": product_page.product.images,
        "specs": specs,
    });

    product_page
        .product
        .offers
        .into_iter()
        .map(|o| {
            Ok(Offer {
                offer_source: OFFER_SOURCE.to_owned(),
                offer_url: o.business_rules.cpc.url,
                retail_prod_name: o.product_name,
                retailer_name: o.store_name,
                country: COUNTRY.to_owned(),
                price: minor_units_from_amount(o.price)?,
                currency: CURRENCY.to_owned(),
                stock_status: StockStatus::Unknown,
                metadata: Some(metadata.clone()),
            })
        })
        .collect()
}

fn html_to_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
}
