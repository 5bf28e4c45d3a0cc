//! `sherlock scrape`: builds a scrape event from the command line, runs the
//! dispatcher and prints what it publishes.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use sherlock_core::{AppConfig, Offer};
use sherlock_scraper::{
    run_scrape, FsHtmlDumper, OfferSink, OfferSource, ScrapeContext, ScrapePayload, TriggeredBy,
};

#[derive(Debug)]
pub(crate) struct ScrapeArgs {
    pub source: String,
    pub gtin: String,
    pub sku: Option<String>,
    pub offer_urls: Vec<(String, Option<String>)>,
    pub countries: Vec<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub triggered_by: String,
}

impl ScrapeArgs {
    pub(crate) fn into_payload(self) -> ScrapePayload {
        let countries: Vec<String> = self
            .countries
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .collect();
        ScrapePayload {
            gtin: self.gtin,
            sku: self.sku,
            offer_urls: self.offer_urls.into_iter().collect(),
            triggered_by: Some(TriggeredBy {
                source: self.triggered_by,
            }),
            product_name: self.product_name,
            brand: self.brand,
            countries: (!countries.is_empty()).then_some(countries),
            ..ScrapePayload::default()
        }
    }
}

/// Parses `KEY=VALUE`; an empty value (or `null`) records a known miss.
pub(crate) fn parse_offer_url(raw: &str) -> Result<(String, Option<String>), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("\"{raw}\" is not KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("\"{raw}\" has an empty key"));
    }
    let value = value.trim();
    let value = (!value.is_empty() && value != "null").then(|| value.to_owned());
    Ok((key.to_owned(), value))
}

/// Writes every publication as one JSON line on stdout.
#[derive(Debug, Default)]
pub(crate) struct StdoutSink;

impl StdoutSink {
    fn emit(line: &serde_json::Value) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            tracing::warn!(error = %e, "failed to write to stdout");
        }
    }
}

impl OfferSink for StdoutSink {
    fn publish_offers(&self, payload: &ScrapePayload, offers: &[Offer], offer_source: &str) {
        Self::emit(&json!({
            "event": "live-search-offers",
            "gtin": payload.gtin,
            "offer_source": offer_source,
            "offers": offers,
        }));
    }

    fn publish_new_offer_urls(&self, gtin: &str, offer_urls: &BTreeMap<String, Option<String>>) {
        Self::emit(&json!({
            "event": "new-offer-urls",
            "gtin": gtin,
            "offer_urls": offer_urls,
        }));
    }
}

pub(crate) async fn run(config: AppConfig, args: ScrapeArgs) -> anyhow::Result<()> {
    let source: OfferSource = args.source.parse()?;
    let dump_dir = config.html_dump_dir.clone();
    let ctx = ScrapeContext::new(config)?
        .with_sink(Arc::new(StdoutSink))
        .with_dumper(Arc::new(FsHtmlDumper::new(dump_dir)));

    let payload = args.into_payload();
    let offers = run_scrape(&ctx, source, &payload).await?;
    tracing::info!(gtin = %payload.gtin, offer_source = %source, offers = offers.len(), "scrape finished");
    Ok(())
}
