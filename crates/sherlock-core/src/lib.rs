pub mod app_config;
pub mod config;
pub mod currency;
pub mod gtin;
pub mod offer;
pub mod price;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use currency::{normalize_iso_code, resolve_currency};
pub use gtin::{gtin_to_ean, normalise_gtin14};
pub use offer::{Offer, StockStatus};
pub use price::{extract_price_and_currency, minor_units_from_amount, parse_minor_units};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("cannot convert gtin to ean: {0} is not a valid gtin")]
    InvalidGtin(String),

    #[error("cannot parse a price amount from \"{0}\"")]
    UnparseablePrice(String),

    #[error("price \"{0}\" parses to zero")]
    ZeroPrice(String),

    #[error("no currency marker in price text \"{0}\"")]
    MissingCurrency(String),

    #[error("cannot convert currency \"{symbol}\" for country {country}")]
    UnknownCurrency { symbol: String, country: String },
}

impl CoreError {
    /// Unmapped currency symbols mean the parser's model of the page is
    /// wrong, so callers abort the whole page instead of skipping one row.
    #[must_use]
    pub fn is_page_fatal(&self) -> bool {
        matches!(self, CoreError::UnknownCurrency { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
