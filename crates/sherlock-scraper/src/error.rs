use sherlock_core::CoreError;
use thiserror::Error;

/// Coarse classification of a [`ScraperError`], used by the dispatcher and
/// by retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure: timeout, connection reset, proxy error.
    Transport,
    /// HTTP 429 from the source.
    RateLimited,
    /// Consent page, captcha or a persistent 403: the session or proxy is burnt.
    Blocked,
    /// The document no longer matches the parser's model of the page.
    ParseMismatch,
    /// The source or an upstream API answered with something unusable.
    Upstream,
    /// Bad GTIN, unsupported source, missing credential.
    InvalidInput,
    /// Local filesystem failure (snapshots, dumps).
    Io,
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("too many requests: {url}")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("{offer_source} blocked the request: {reason}")]
    Blocked { offer_source: String, reason: String },

    #[error("{offer_source} page does not match the parser: {reason}")]
    ParseMismatch { offer_source: String, reason: String },

    #[error(transparent)]
    Normalize(#[from] CoreError),

    #[error("PriceAPI error: {0}")]
    PriceApi(String),

    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("offer source \"{0}\" is not supported")]
    UnsupportedSource(String),

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("I/O error for {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error for {context}: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
}

impl ScraperError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Http(_) => ErrorKind::Transport,
            ScraperError::RateLimited { .. } => ErrorKind::RateLimited,
            ScraperError::Blocked { .. } => ErrorKind::Blocked,
            ScraperError::ParseMismatch { .. } | ScraperError::Deserialize { .. } => {
                ErrorKind::ParseMismatch
            }
            ScraperError::Normalize(CoreError::InvalidGtin(_))
            | ScraperError::MissingCredential(_)
            | ScraperError::UnsupportedSource(_)
            | ScraperError::InvalidUrl { .. } => ErrorKind::InvalidInput,
            ScraperError::Normalize(_) => ErrorKind::ParseMismatch,
            ScraperError::UnexpectedStatus { .. } | ScraperError::PriceApi(_) => {
                ErrorKind::Upstream
            }
            ScraperError::Io { .. } | ScraperError::Csv { .. } => ErrorKind::Io,
        }
    }

    /// Proxy and connection failures that are worth retrying with backoff.
    #[must_use]
    pub fn is_transient_transport(&self) -> bool {
        match self {
            ScraperError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    pub(crate) fn parse_mismatch(offer_source: &str, reason: impl Into<String>) -> Self {
        ScraperError::ParseMismatch {
            offer_source: offer_source.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn blocked(offer_source: &str, reason: impl Into<String>) -> Self {
        ScraperError::Blocked {
            offer_source: offer_source.to_owned(),
            reason: reason.into(),
        }
    }
}
