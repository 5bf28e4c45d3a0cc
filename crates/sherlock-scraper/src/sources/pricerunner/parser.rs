//! PriceRunner JSON API payloads: search results and product listings.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use sherlock_core::{minor_units_from_amount, normalize_iso_code, parse_minor_units, Offer, StockStatus};

use crate::client::absolute_url;
use crate::error::ScraperError;

const STOCK: &[(&str, StockStatus)] = &[
    ("IN_STOCK", StockStatus::InStock),
    ("OUT_OF_STOCK", StockStatus::OutOfStock),
];

#[derive(Debug, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    products: Vec<SearchProduct>,
}

#[derive(Debug, Deserialize)]
struct SearchProduct {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Listings {
    filtered_offer_list: OfferList,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferList {
    #[serde(default)]
    merchants: HashMap<String, Merchant>,
    #[serde(default)]
    merchant_offers: Vec<MerchantOffer>,
}

#[derive(Debug, Deserialize)]
struct Merchant {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MerchantOffer {
    merchant_id: Value,
    price: ListingPrice,
    #[serde(default)]
    offers: Vec<OfferInfo>,
}

#[derive(Debug, Deserialize)]
struct ListingPrice {
    amount: Value,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferInfo {
    name: String,
    url: String,
    stock_status: Option<String>,
}

/// Path of the best-matching product, e.g.
/// `/pl/110-5286908/Datormoess/Logitech-MX-Anywhere-3-priser`.
///
/// PriceRunner returns loosely related products for unknown GTINs, so only
/// the first hit is considered.
#[must_use]
pub fn first_product_path(results: SearchResults) -> Option<String> {
    results.products.into_iter().next().map(|p| p.url)
}

/// Listings API URL for a product page URL: the category directory and the
/// product id are the first two path segments.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] when the URL has fewer than two path
/// segments.
pub fn listings_url(base: &str, product_url: &str, country: &str) -> Result<String, ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: product_url.to_owned(),
        reason: reason.to_owned(),
    };
    let parsed = reqwest::Url::parse(product_url).map_err(|e| invalid(&e.to_string()))?;
    let mut segments = parsed
        .path_segments()
        .ok_or_else(|| invalid("cannot be a base"))?
        .filter(|s| !s.is_empty());
    let (Some(dir), Some(id)) = (segments.next(), segments.next()) else {
        return Err(invalid("expected /<dir>/<id>/... product path"));
    };
    Ok(format!(
        "{base}/public/productlistings/v3/{dir}/{id}/{}/filter?offer_sort=price",
        country.to_ascii_lowercase()
    ))
}

/// Parses a product-listings response body. Offer URLs are relative to
/// `base`.
///
/// # Errors
///
/// - [`ScraperError::Deserialize`] when the body is not a listings document.
/// - [`ScraperError::ParseMismatch`] when an offer references an unknown
///   merchant or carries no offer details.
/// - [`ScraperError::Normalize`] on an unparseable amount or currency code.
pub fn parse_listings(body: &str, country: &str, base: &str) -> Result<Vec<Offer>, ScraperError> {
    let offer_source = format!("pricerunner_{country}");
    let listings: Listings = serde_json::from_str(body).map_err(|e| ScraperError::Deserialize {
        context: format!("{offer_source} product listings"),
        source: e,
    })?;
    let list = listings.filtered_offer_list;

    list.merchant_offers
        .into_iter()
        .map(|merchant_offer| {
            let merchant_id = value_to_key(&merchant_offer.merchant_id);
            let merchant = list.merchants.get(&merchant_id).ok_or_else(|| {
                ScraperError::parse_mismatch(&offer_source, format!("unknown merchant {merchant_id}"))
            })?;
            let info = merchant_offer.offers.into_iter().next().ok_or_else(|| {
                ScraperError::parse_mismatch(&offer_source, format!("merchant {merchant_id} has no offers"))
            })?;
            let stock_status = info
                .stock_status
                .as_deref()
                .and_then(|raw| StockStatus::lookup(STOCK, raw))
                .unwrap_or(StockStatus::Unknown);

            Ok(Offer {
                offer_source: offer_source.clone(),
                offer_url: absolute_url(base, &info.url),
                retail_prod_name: info.name,
                retailer_name: merchant.name.clone(),
                country: country.to_owned(),
                price: amount_to_minor_units(&merchant_offer.price.amount)?,
                currency: normalize_iso_code(&merchant_offer.price.currency)?,
                stock_status,
                metadata: None,
            })
        })
        .collect()
}

fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn amount_to_minor_units(amount: &Value) -> Result<i64, ScraperError> {
    let minor = match amount {
        Value::String(s) => parse_minor_units(s)?,
        Value::Number(n) => minor_units_from_amount(n.as_f64().unwrap_or(f64::NAN))?,
        other => parse_minor_units(&other.to_string())?,
    };
    Ok(minor)
}
