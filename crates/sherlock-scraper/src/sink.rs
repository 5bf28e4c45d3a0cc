//! Outbound collaborators: the offer/locator sinks and the diagnostic HTML dump.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use sherlock_core::Offer;

use crate::dispatch::ScrapePayload;

/// Receives results of a scrape. Implementations are fire-and-forget: they
/// log their own failures instead of returning them.
pub trait OfferSink: Send + Sync {
    /// Called exactly once per top-level scrape, even when it failed.
    fn publish_offers(&self, payload: &ScrapePayload, offers: &[Offer], offer_source: &str);

    /// Reports locators discovered (or confirmed missing) during a scrape.
    fn publish_new_offer_urls(&self, gtin: &str, offer_urls: &BTreeMap<String, Option<String>>);
}

/// Sink that only records what would have been published in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OfferSink for TracingSink {
    fn publish_offers(&self, payload: &ScrapePayload, offers: &[Offer], offer_source: &str) {
        tracing::info!(
            gtin = %payload.gtin,
            offer_source,
            nb_offers = offers.len(),
            "live-search-offers-published"
        );
    }

    fn publish_new_offer_urls(&self, gtin: &str, offer_urls: &BTreeMap<String, Option<String>>) {
        tracing::info!(gtin, offer_urls = ?offer_urls, "new-offer-urls-published");
    }
}

/// Persists raw page bodies that failed to parse. Best-effort: the returned
/// future never fails.
pub trait HtmlDumper: Send + Sync {
    fn dump<'a>(
        &'a self,
        offer_source: &'a str,
        key: &'a str,
        country: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, ()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDumper;

impl HtmlDumper for NoopDumper {
    fn dump<'a>(
        &'a self,
        _offer_source: &'a str,
        _key: &'a str,
        _country: &'a str,
        _body: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// Writes `{root}/{offer_source}/{key}_{country}.html`.
#[derive(Debug, Clone)]
pub struct FsHtmlDumper {
    root: PathBuf,
}

impl FsHtmlDumper {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, offer_source: &str, key: &str, country: &str) -> PathBuf {
        self.root
            .join(offer_source)
            .join(format!("{key}_{country}.html"))
    }
}

impl HtmlDumper for FsHtmlDumper {
    fn dump<'a>(
        &'a self,
        offer_source: &'a str,
        key: &'a str,
        country: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, ()> {
        let path = self.path_for(offer_source, key, country);
        Box::pin(async move {
            match write_dump(&path, body).await {
                Ok(()) => tracing::info!(path = %path.display(), "dumped page for inspection"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to dump page"),
            }
        })
    }
}

async fn write_dump(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await
}
