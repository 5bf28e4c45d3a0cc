//! Google Shopping identifier resolver.
//!
//! Maps a product name plus the GTIN (or SKU) we expect to a Google Shopping
//! product id. Search results are candidates; for each candidate the offer
//! table is followed to every retailer's landing page, the GTINs found there
//! are majority-voted, and when the vote disagrees with the expected GTIN
//! the candidate's variant siblings are walked.
//!
//! The walk is a worklist with a visited set and a node budget, so it ends
//! even on cyclic or very large variant graphs. Memo tables live in a
//! [`SearchCache`] owned by the resolver and shared by its concurrent
//! retailer lookups.

pub mod cache;
pub mod search;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sherlock_core::normalise_gtin14;

use crate::client::{extract_store_origin, HttpResponse, RequestOptions};
use crate::context::ScrapeContext;
use crate::error::ScraperError;
use crate::gtin_extract::find_gtin_in_html;
use crate::rate_limit::retry_with_backoff;
use crate::sources::google_shopping::uule;

pub use cache::{AdLink, SearchCache};

/// Pre-accepted consent cookies; without them every page is the consent
/// interstitial.
pub const GOOGLE_SHOPPING_COOKIES: &str = "SOCS=CAESNQgCEitib3FfaWRlbnRpdHlmcm9udGVuZHVpc2VydmVyXzIwMjQwMTAyLjA1X3AwGgJlbiACGgYIgI3drAY; CONSENT=PENDING+105";

/// What to look for.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub name: String,
    pub brand: Option<String>,
    pub gtin: Option<String>,
    pub sku: Option<String>,
}

impl ProductQuery {
    /// Name up to the first parenthesis, prefixed with the brand unless the
    /// name already contains it.
    #[must_use]
    pub fn search_term(&self) -> String {
        let main_name = self.name.split('(').next().unwrap_or_default().trim();
        match self.brand.as_deref().map(str::trim) {
            Some(brand) if !brand.is_empty() && !main_name.contains(brand) => {
                format!("{brand} {main_name}")
            }
            _ => main_name.to_owned(),
        }
    }

    fn accepts(&self, gtin: &str) -> bool {
        match self.gtin.as_deref() {
            None => true,
            Some(expected) => normalise_gtin14(expected).as_deref() == Some(gtin),
        }
    }
}

pub struct GoogleShoppingResolver<'a> {
    ctx: &'a ScrapeContext,
    cache: Mutex<SearchCache>,
}

impl<'a> GoogleShoppingResolver<'a> {
    #[must_use]
    pub fn new(ctx: &'a ScrapeContext) -> Self {
        Self::with_cache(ctx, SearchCache::default())
    }

    #[must_use]
    pub fn with_cache(ctx: &'a ScrapeContext, cache: SearchCache) -> Self {
        Self {
            ctx,
            cache: Mutex::new(cache),
        }
    }

    /// Resolver primed from the snapshot in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Csv`] when a snapshot file is malformed.
    pub fn load(ctx: &'a ScrapeContext, dir: &Path) -> Result<Self, ScraperError> {
        Ok(Self::with_cache(ctx, SearchCache::load(dir)?))
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Io`] or [`ScraperError::Csv`] on write failures.
    pub fn save(&self, dir: &Path) -> Result<(), ScraperError> {
        self.snapshot().save(dir)
    }

    #[must_use]
    pub fn snapshot(&self) -> SearchCache {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SearchCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tries each market in order; the first hit wins.
    ///
    /// # Errors
    ///
    /// See [`GoogleShoppingResolver::find_product_id`].
    pub async fn find_product_id_multiple_markets(
        &self,
        query: &ProductQuery,
        countries: &[String],
    ) -> Result<Option<(String, String)>, ScraperError> {
        for country in countries {
            if let Some(id) = self.find_product_id(query, country).await? {
                return Ok(Some((id, country.clone())));
            }
        }
        Ok(None)
    }

    /// Searches Google Shopping in `country` and returns the id of the first
    /// candidate (or variant of one) whose retailers carry the expected GTIN.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] when Google answers 429.
    /// - [`ScraperError::Http`] when proxy retries are exhausted.
    pub async fn find_product_id(
        &self,
        query: &ProductQuery,
        country: &str,
    ) -> Result<Option<String>, ScraperError> {
        if query.gtin.is_none() && query.sku.is_none() {
            return Ok(None);
        }

        let url = search_url(&self.ctx.endpoints.google, &query.search_term(), country);
        let page = self.fetch_google(&url, country).await?;

        let candidates = search::candidate_product_ids(&page.body);
        self.record_ad_links(search::ad_links(&page.body), query);

        let mut budget = self.ctx.config.resolver_max_nodes;
        let mut visited_product_pages = 0usize;
        for candidate in candidates {
            visited_product_pages += 1;
            if let Some((id, _gtin)) = self
                .walk_variants(&candidate, query, country, &mut budget)
                .await?
            {
                tracing::info!(visited_product_pages, product_id = %id, country, "resolved product id");
                return Ok(Some(id));
            }
        }
        tracing::info!(visited_product_pages, country, "no product id matched");
        Ok(None)
    }

    /// Depth-first walk from `root` over variant siblings. Returns the first
    /// `(product_id, gtin)` whose GTIN the query accepts.
    async fn walk_variants(
        &self,
        root: &str,
        query: &ProductQuery,
        country: &str,
        budget: &mut usize,
    ) -> Result<Option<(String, String)>, ScraperError> {
        let mut stack = vec![root.to_owned()];
        let mut known: HashSet<String> = HashSet::from([root.to_owned()]);

        while let Some(product_id) = stack.pop() {
            if let Some(gtin) = self.lock().gtin_for(&product_id).map(str::to_owned) {
                if query.accepts(&gtin) {
                    return Ok(Some((product_id, gtin)));
                }
                continue;
            }
            if self.lock().is_without_gtin(&product_id, country) {
                continue;
            }
            if *budget == 0 {
                tracing::warn!(root, country, "variant walk node budget exhausted");
                return Ok(None);
            }
            *budget -= 1;

            let page = self
                .fetch_google(&product_page_url(&self.ctx.endpoints.google, &product_id, country), country)
                .await?;
            let gtin = self
                .product_gtin(&product_id, country, query.gtin.as_deref(), query.sku.as_deref())
                .await?;
            match gtin {
                Some(gtin) if query.accepts(&gtin) => return Ok(Some((product_id, gtin))),
                None if query.gtin.is_none() => return Ok(None),
                _ => {}
            }

            for variant in search::variant_ids(&page.body).into_iter().rev() {
                if known.insert(variant.clone()) {
                    stack.push(variant);
                }
            }
        }
        Ok(None)
    }

    /// Majority GTIN across the retailer pages of `product_id`'s offer table,
    /// memoized in both directions: a product whose retailers yield nothing
    /// is never fetched again for that country.
    ///
    /// # Errors
    ///
    /// Errors fetching the offers page itself. Retailer failures only lose
    /// that retailer's vote.
    pub async fn product_gtin(
        &self,
        product_id: &str,
        country: &str,
        expected_gtin: Option<&str>,
        expected_sku: Option<&str>,
    ) -> Result<Option<String>, ScraperError> {
        if let Some(gtin) = self.lock().gtin_for(product_id) {
            return Ok(Some(gtin.to_owned()));
        }
        if self.lock().is_without_gtin(product_id, country) {
            tracing::debug!(product_id, country, "product known to have no gtin");
            return Ok(None);
        }

        let url = offers_page_url(&self.ctx.endpoints.google, product_id, country);
        let page = self.fetch_google(&url, country).await?;
        let links = search::retailer_offer_links(&page.body);

        let gtins: Vec<Option<String>> = stream::iter(links)
            .map(|(retailer, href)| async move {
                self.gtin_from_retailer(&retailer, &href, expected_gtin, expected_sku)
                    .await
            })
            .buffered(self.ctx.config.max_concurrent_retailers.max(1))
            .collect()
            .await;

        let mut cache = self.lock();
        match majority_gtin(gtins.into_iter().flatten()) {
            Some(gtin) => {
                cache.id_to_gtin.insert(product_id.to_owned(), gtin.clone());
                Ok(Some(gtin))
            }
            None => {
                cache
                    .products_without_gtin
                    .insert((product_id.to_owned(), country.to_owned()));
                Ok(None)
            }
        }
    }

    /// Image of a product: numeric ids have an offers page, composite ids
    /// (`epd:…,eto:…,pid:…`) only a single-offer page.
    ///
    /// # Errors
    ///
    /// Errors fetching the page.
    pub async fn extract_product_image(
        &self,
        product_id: &str,
        country: &str,
    ) -> Result<Option<String>, ScraperError> {
        let base = &self.ctx.endpoints.google;
        let single_offer = !product_id.chars().all(|c| c.is_ascii_digit());
        let url = if single_offer {
            format!(
                "{base}/shopping/product/1?prds={}&hl=en&gl={}",
                utf8_percent_encode(product_id, NON_ALPHANUMERIC),
                country.to_ascii_lowercase()
            )
        } else {
            offers_page_url(base, product_id, country)
        };
        let page = self.fetch_google(&url, country).await?;
        Ok(search::product_image(&page.body, single_offer))
    }

    async fn gtin_from_retailer(
        &self,
        retailer: &str,
        redirect_href: &str,
        expected_gtin: Option<&str>,
        expected_sku: Option<&str>,
    ) -> Option<String> {
        let url = search::retailer_url(redirect_href)?;
        match self.ctx.transport.get(&url, RequestOptions::default()).await {
            Ok(response) => {
                let gtin = find_gtin_in_html(&response.body, expected_gtin, expected_sku);
                tracing::debug!(
                    retailer,
                    store = %extract_store_origin(&url),
                    gtin = gtin.as_deref().unwrap_or("-"),
                    "retailer page checked"
                );
                gtin
            }
            Err(e) => {
                tracing::warn!(retailer, url = %url, error = %e, "failed to fetch retailer page");
                None
            }
        }
    }

    fn record_ad_links(&self, links: Vec<String>, query: &ProductQuery) {
        let mut cache = self.lock();
        cache.ad_links.extend(links.into_iter().map(|ad_link| AdLink {
            ad_link,
            gtin: query.gtin.clone(),
            sku: query.sku.clone(),
        }));
    }

    /// GET with consent cookies through the country's proxy, retrying proxy
    /// failures with backoff.
    async fn fetch_google(&self, url: &str, country: &str) -> Result<HttpResponse, ScraperError> {
        let config = &self.ctx.config;
        if config.inter_request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.inter_request_delay_ms)).await;
        }
        let options = RequestOptions {
            proxy_country: Some(country),
            cookies: Some(GOOGLE_SHOPPING_COOKIES),
            ..RequestOptions::default()
        };
        let response = retry_with_backoff(config.max_retries, config.retry_backoff_base_secs, || {
            self.ctx.transport.get(url, options)
        })
        .await?;
        if !response.is_success() {
            tracing::warn!(url, status = response.status.as_u16(), "unexpected google status");
        }
        Ok(response)
    }
}

/// Most frequent GTIN; ties go to the one seen first.
fn majority_gtin(gtins: impl IntoIterator<Item = String>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for gtin in gtins {
        match counts.iter_mut().find(|(seen, _)| *seen == gtin) {
            Some(entry) => entry.1 += 1,
            None => counts.push((gtin, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (gtin, count) in counts {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((gtin, count));
        }
    }
    best.map(|(gtin, _)| gtin)
}

#[must_use]
pub fn search_url(base: &str, term: &str, country: &str) -> String {
    let mut url = format!(
        "{base}/search?q={}&gl={}&hl=en&tbm=shop",
        utf8_percent_encode(term, NON_ALPHANUMERIC),
        country.to_ascii_lowercase()
    );
    if let Some(uule) = uule::encoded_uule_for(country) {
        url.push_str("&uule=");
        url.push_str(&uule);
    }
    url
}

fn product_page_url(base: &str, product_id: &str, country: &str) -> String {
    format!(
        "{base}/shopping/product/{product_id}?hl=en&gl={}",
        country.to_ascii_lowercase()
    )
}

fn offers_page_url(base: &str, product_id: &str, country: &str) -> String {
    format!(
        "{base}/shopping/product/{product_id}/offers?hl=en&gl={}",
        country.to_ascii_lowercase()
    )
}
