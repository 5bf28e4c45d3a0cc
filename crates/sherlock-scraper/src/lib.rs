//! Price-offer scrapers for Google Shopping, Idealo, Kelkoo, PriceRunner and
//! KuantoKusta, plus the Google Shopping identifier resolver.

pub mod client;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gtin_extract;
pub(crate) mod rate_limit;
pub mod resolver;
pub mod sink;
pub mod sources;
pub mod types;

pub use client::{HttpResponse, HttpTransport, RequestOptions, Session};
pub use context::{Endpoints, ScrapeContext};
pub use dispatch::{run_scrape, OfferSource, ScrapePayload, TriggeredBy};
pub use error::{ErrorKind, ScraperError};
pub use gtin_extract::find_gtin_in_html;
pub use resolver::{GoogleShoppingResolver, ProductQuery, SearchCache};
pub use sink::{FsHtmlDumper, HtmlDumper, NoopDumper, OfferSink, TracingSink};
pub use sources::idealo::priceapi::PollSettings;
pub use types::{CachedLocators, CountryError, PageOutcome, ScrapeReport, ScrapeRequest};
