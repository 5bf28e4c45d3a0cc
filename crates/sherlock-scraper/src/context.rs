use std::sync::Arc;

use sherlock_core::AppConfig;

use crate::client::HttpTransport;
use crate::error::ScraperError;
use crate::sink::{HtmlDumper, NoopDumper, OfferSink, TracingSink};
use crate::sources::idealo::priceapi::PollSettings;

/// Base URLs of every remote the pipelines talk to. Production values by
/// default; tests point them at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub google: String,
    /// Replaces every per-country Idealo host when set.
    pub idealo: Option<String>,
    pub kelkoo: String,
    /// Replaces every per-country PriceRunner host when set.
    pub pricerunner: Option<String>,
    pub kuantokusta: String,
    pub priceapi: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            google: "https://www.google.com".to_owned(),
            idealo: None,
            kelkoo: "https://api.kelkoogroup.net".to_owned(),
            pricerunner: None,
            kuantokusta: "https://www.kuantokusta.pt".to_owned(),
            priceapi: "https://api.priceapi.com".to_owned(),
        }
    }
}

impl Endpoints {
    /// Every remote served from one host.
    #[must_use]
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_owned();
        Self {
            google: base.clone(),
            idealo: Some(base.clone()),
            kelkoo: base.clone(),
            pricerunner: Some(base.clone()),
            kuantokusta: base.clone(),
            priceapi: base,
        }
    }
}

/// Everything a source pipeline needs besides its request.
pub struct ScrapeContext {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub endpoints: Endpoints,
    pub sink: Arc<dyn OfferSink>,
    pub dumper: Arc<dyn HtmlDumper>,
    pub priceapi_poll: PollSettings,
}

impl ScrapeContext {
    /// Builds a context with the production endpoints, a log-only sink and
    /// no HTML dumps.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the transport cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, ScraperError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self {
            config,
            transport,
            endpoints: Endpoints::default(),
            sink: Arc::new(TracingSink),
            dumper: Arc::new(NoopDumper),
            priceapi_poll: PollSettings::default(),
        })
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OfferSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_dumper(mut self, dumper: Arc<dyn HtmlDumper>) -> Self {
        self.dumper = dumper;
        self
    }

    #[must_use]
    pub fn with_priceapi_poll(mut self, poll: PollSettings) -> Self {
        self.priceapi_poll = poll;
        self
    }

    /// Runs `parse` over `body`, dumping the body before handing back any
    /// parse error.
    pub(crate) async fn parse_or_dump<T>(
        &self,
        offer_source: &str,
        key: &str,
        country: &str,
        body: &str,
        parse: impl FnOnce(&str) -> Result<T, ScraperError>,
    ) -> Result<T, ScraperError> {
        let result = parse(body);
        if let Err(e) = &result {
            tracing::error!(offer_source, key, country, error = %e, "failed to parse page");
            self.dumper.dump(offer_source, key, country, body).await;
        }
        result
    }
}
