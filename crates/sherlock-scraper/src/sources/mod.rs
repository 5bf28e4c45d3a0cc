//! One pipeline per price-comparison source. Each exposes
//! `scrape(&ScrapeContext, &ScrapeRequest) -> ScrapeReport`.

pub mod google_shopping;
pub mod idealo;
pub mod kelkoo;
pub mod kuantokusta;
pub mod pricerunner;
