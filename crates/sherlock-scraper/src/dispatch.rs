//! Entry point for one scrape event: pick the source pipeline, run it,
//! publish whatever it found, then surface the first failure.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sherlock_core::Offer;

use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::sources::{google_shopping, idealo, kelkoo, kuantokusta, pricerunner};
use crate::types::{ScrapeReport, ScrapeRequest};

/// Only this trigger runs the Google Shopping pipeline.
pub const GOOGLE_SHOPPING_TRIGGER: &str = "b2b_job";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggeredBy {
    #[serde(default)]
    pub source: String,
}

/// The event that asks for offers of one product. Fields this crate does
/// not read are kept and handed back to the offer sink untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapePayload {
    pub gtin: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub offer_urls: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub user_country: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<TriggeredBy>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScrapePayload {
    #[must_use]
    pub fn new(gtin: impl Into<String>) -> Self {
        Self {
            gtin: gtin.into(),
            ..Self::default()
        }
    }

    fn to_request(&self) -> ScrapeRequest {
        ScrapeRequest {
            gtin: self.gtin.clone(),
            sku: self.sku.clone(),
            cached: self.offer_urls.clone(),
            countries: self.countries.clone(),
            product_name: self.product_name.clone(),
            brand: self.brand.clone(),
        }
    }

    fn triggered_by_b2b(&self) -> bool {
        self.triggered_by
            .as_ref()
            .is_some_and(|t| t.source == GOOGLE_SHOPPING_TRIGGER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSource {
    GoogleShopping,
    Idealo,
    Kelkoo,
    PriceRunner,
    KuantoKusta,
    /// Accepted for compatibility; yields no offers.
    Prisjakt,
}

impl OfferSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OfferSource::GoogleShopping => google_shopping::OFFER_SOURCE,
            OfferSource::Idealo => idealo::OFFER_SOURCE,
            OfferSource::Kelkoo => kelkoo::OFFER_SOURCE,
            OfferSource::PriceRunner => pricerunner::OFFER_SOURCE,
            OfferSource::KuantoKusta => kuantokusta::OFFER_SOURCE,
            OfferSource::Prisjakt => "prisjakt",
        }
    }
}

impl fmt::Display for OfferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferSource {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_shopping" => Ok(OfferSource::GoogleShopping),
            "idealo" => Ok(OfferSource::Idealo),
            "kelkoo" => Ok(OfferSource::Kelkoo),
            "pricerunner" => Ok(OfferSource::PriceRunner),
            "kuantokusta" => Ok(OfferSource::KuantoKusta),
            "prisjakt" => Ok(OfferSource::Prisjakt),
            other => Err(ScraperError::UnsupportedSource(other.to_owned())),
        }
    }
}

/// Runs one source for `payload`.
///
/// Offers are published exactly once per run, failures included. Each
/// per-country error is logged; the first one is returned after publishing.
/// Google Shopping is skipped (nothing published) unless the payload was
/// triggered by a B2B job.
///
/// # Errors
///
/// The first per-country error collected by the pipeline.
pub async fn run_scrape(
    ctx: &ScrapeContext,
    source: OfferSource,
    payload: &ScrapePayload,
) -> Result<Vec<Offer>, ScraperError> {
    if source == OfferSource::GoogleShopping && !payload.triggered_by_b2b() {
        tracing::info!(gtin = %payload.gtin, "skipping search, google shopping is only enabled for b2b");
        return Ok(Vec::new());
    }

    tracing::info!(
        offer_source = %source,
        gtin = %payload.gtin,
        payload = ?payload,
        "offer-scraping-started"
    );

    let request = payload.to_request();
    let report = match source {
        OfferSource::GoogleShopping => google_shopping::scrape(ctx, &request).await,
        OfferSource::Idealo => idealo::scrape(ctx, &request).await,
        OfferSource::Kelkoo => kelkoo::scrape(ctx, &request).await,
        OfferSource::PriceRunner => pricerunner::scrape(ctx, &request).await,
        OfferSource::KuantoKusta => kuantokusta::scrape(ctx, &request).await,
        OfferSource::Prisjakt => ScrapeReport::default(),
    };

    let ScrapeReport { offers, errors } = report;
    for e in &errors {
        tracing::error!(
            error = %e.error,
            kind = ?e.error.kind(),
            country = %e.country,
            gtin = %payload.gtin,
            offer_source = %source,
            "error when fetching offers"
        );
    }

    ctx.sink.publish_offers(payload, &offers, source.as_str());

    match errors.into_iter().next() {
        Some(first) => Err(first.error),
        None => Ok(offers),
    }
}
