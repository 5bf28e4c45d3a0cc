//! Shared helpers for the scraper integration tests: a zero-delay config, a
//! context pointed at a `wiremock` server and a sink that records calls.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sherlock_core::{AppConfig, Environment, Offer};
use sherlock_scraper::{Endpoints, OfferSink, PollSettings, ScrapeContext, ScrapePayload};

pub const GTIN: &str = "08806091153807";

pub fn test_config() -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "debug".to_owned(),
        request_timeout_secs: 5,
        log_responses: true,
        proxies: BTreeMap::new(),
        max_concurrent_countries: 4,
        max_concurrent_retailers: 4,
        max_retries: 0,
        retry_backoff_base_secs: 0,
        inter_request_delay_ms: 0,
        pricerunner_pause_min_secs: 0,
        pricerunner_pause_max_secs: 0,
        resolver_max_nodes: 200,
        resolver_cache_dir: PathBuf::from("./output"),
        html_dump_dir: PathBuf::from("./offer_scrapers_html"),
        kelkoo_jwt_token: Some("test-jwt".to_owned()),
        priceapi_api_key: Some("test-key".to_owned()),
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<(String, String, Vec<Offer>)>>,
    pub offer_urls: Mutex<Vec<(String, BTreeMap<String, Option<String>>)>>,
}

impl RecordingSink {
    /// `(gtin, offer_source, offers)` per `publish_offers` call.
    pub fn published(&self) -> Vec<(String, String, Vec<Offer>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn offer_urls(&self) -> Vec<(String, BTreeMap<String, Option<String>>)> {
        self.offer_urls.lock().unwrap().clone()
    }
}

impl OfferSink for RecordingSink {
    fn publish_offers(&self, payload: &ScrapePayload, offers: &[Offer], offer_source: &str) {
        self.published.lock().unwrap().push((
            payload.gtin.clone(),
            offer_source.to_owned(),
            offers.to_vec(),
        ));
    }

    fn publish_new_offer_urls(&self, gtin: &str, offer_urls: &BTreeMap<String, Option<String>>) {
        self.offer_urls
            .lock()
            .unwrap()
            .push((gtin.to_owned(), offer_urls.clone()));
    }
}

/// Context with every endpoint on `base` and a recording sink.
pub fn context(base: &str, config: AppConfig) -> (ScrapeContext, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ctx = ScrapeContext::new(config)
        .expect("test context")
        .with_endpoints(Endpoints::single_host(base))
        .with_sink(sink.clone())
        .with_priceapi_poll(PollSettings {
            interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(2),
        });
    (ctx, sink)
}
