use std::collections::BTreeMap;

use sherlock_core::Offer;

use crate::error::ScraperError;

/// Locators known for a product, keyed by `offer_source` (`"idealo_DE"`,
/// `"google_shopping"`, ...). A `None` value records an earlier search that
/// found nothing, so the search is not repeated.
pub type CachedLocators = BTreeMap<String, Option<String>>;

/// Input of one source pipeline.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    pub gtin: String,
    pub sku: Option<String>,
    pub cached: CachedLocators,
    /// Overrides the source's default country list.
    pub countries: Option<Vec<String>>,
    /// Free-text name and brand, used by sources that search by name.
    pub product_name: Option<String>,
    pub brand: Option<String>,
}

impl ScrapeRequest {
    #[must_use]
    pub fn new(gtin: impl Into<String>) -> Self {
        Self {
            gtin: gtin.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cached(mut self, key: impl Into<String>, locator: impl Into<String>) -> Self {
        self.cached.insert(key.into(), Some(locator.into()));
        self
    }

    #[must_use]
    pub fn with_countries(mut self, countries: &[&str]) -> Self {
        self.countries = Some(countries.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    /// A cached locator for `key`: `Some(Some(_))` hit, `Some(None)` known
    /// miss, `None` never searched.
    #[must_use]
    pub fn cached_locator(&self, key: &str) -> Option<Option<&str>> {
        self.cached.get(key).map(Option::as_deref)
    }

    pub(crate) fn countries_or(&self, defaults: &[&str]) -> Vec<String> {
        self.countries.clone().unwrap_or_else(|| {
            defaults.iter().map(|c| (*c).to_owned()).collect()
        })
    }
}

/// What one fetched page yielded. Expected-empty conditions are values, not
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Offers(Vec<Offer>),
    /// The source says it does not know the product.
    NotFound,
    /// HTTP 410 or an equivalent terminal "removed" signal.
    Gone,
    /// Blank or server-error rendering; retrying does not reliably help.
    Empty,
}

impl PageOutcome {
    /// Flattens the outcome into its offers, logging the empty variants.
    #[must_use]
    pub fn into_offers(self, offer_source: &str, country: &str) -> Vec<Offer> {
        match self {
            PageOutcome::Offers(offers) => offers,
            PageOutcome::NotFound => {
                tracing::warn!(offer_source, country, "product not found on source");
                Vec::new()
            }
            PageOutcome::Gone => {
                tracing::warn!(offer_source, country, "product page is gone");
                Vec::new()
            }
            PageOutcome::Empty => {
                tracing::warn!(offer_source, country, "empty page rendered");
                Vec::new()
            }
        }
    }
}

#[derive(Debug)]
pub struct CountryError {
    pub country: String,
    pub error: ScraperError,
}

/// Aggregated result of one source pipeline: every offer collected and one
/// entry per failed country.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub offers: Vec<Offer>,
    pub errors: Vec<CountryError>,
}

impl ScrapeReport {
    pub(crate) fn push_result(&mut self, country: &str, result: Result<Vec<Offer>, ScraperError>) {
        match result {
            Ok(offers) => self.offers.extend(offers),
            Err(error) => self.errors.push(CountryError {
                country: country.to_owned(),
                error,
            }),
        }
    }

    pub(crate) fn from_error(country: &str, error: ScraperError) -> Self {
        Self {
            offers: Vec::new(),
            errors: vec![CountryError {
                country: country.to_owned(),
                error,
            }],
        }
    }
}

/// Drops offers that violate the published-offer invariant.
pub(crate) fn retain_publishable(offer_source: &str, offers: Vec<Offer>) -> Vec<Offer> {
    let before = offers.len();
    let kept: Vec<Offer> = offers.into_iter().filter(Offer::is_publishable).collect();
    if kept.len() < before {
        tracing::warn!(
            offer_source,
            dropped = before - kept.len(),
            "dropped offers without retailer identity or price"
        );
    }
    kept
}
