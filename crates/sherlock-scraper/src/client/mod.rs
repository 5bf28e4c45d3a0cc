//! Transport shim every source pipeline sends its requests through.
//!
//! Adds default headers (a randomly chosen browser `User-Agent`, compressed
//! encodings), picks a proxied client by logical proxy country, applies the
//! configured timeout and emits one `make-request` event per response.

mod url;

use std::collections::BTreeMap;
use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::{Client, RequestBuilder, StatusCode};
use sherlock_core::AppConfig;

use crate::error::ScraperError;

pub use url::{absolute_url, extract_store_origin, last_path_segment, query_param, redact_secrets};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const FALLBACK_UA: &str = USER_AGENTS[0];

/// Per-request options on top of the shim defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions<'a> {
    /// Logical egress country. Requests fall back to a direct connection
    /// when no proxy is configured for it.
    pub proxy_country: Option<&'a str>,
    /// Raw `Cookie` header value.
    pub cookies: Option<&'a str>,
    pub bearer_token: Option<&'a str>,
    pub accept: Option<&'a str>,
}

impl<'a> RequestOptions<'a> {
    #[must_use]
    pub fn via(proxy_country: &'a str) -> Self {
        Self {
            proxy_country: Some(proxy_country),
            ..Self::default()
        }
    }
}

/// A fully read response. Non-2xx statuses are values here; each source
/// decides which of them are expected.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turns any non-2xx status into [`ScraperError::UnexpectedStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnexpectedStatus`] for non-2xx responses.
    pub fn error_for_status(self) -> Result<Self, ScraperError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScraperError::UnexpectedStatus {
                status: self.status.as_u16(),
                url: self.url,
            })
        }
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] when the body does not match `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self, context: &str) -> Result<T, ScraperError> {
        serde_json::from_str(&self.body).map_err(|e| ScraperError::Deserialize {
            context: format!("{context} from {}", self.url),
            source: e,
        })
    }
}

pub struct HttpTransport {
    direct: Client,
    proxied: BTreeMap<String, Client>,
    proxy_urls: BTreeMap<String, String>,
    timeout: Duration,
    log_responses: bool,
}

impl HttpTransport {
    /// Builds one client per configured proxy country plus a direct one.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if a proxy URL is invalid or a client
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        proxies: &BTreeMap<String, String>,
        log_responses: bool,
    ) -> Result<Self, ScraperError> {
        let timeout = Duration::from_secs(timeout_secs);
        let direct = build_client(timeout, None, false)?;
        let proxied = proxies
            .iter()
            .map(|(country, url)| Ok((country.clone(), build_client(timeout, Some(url), false)?)))
            .collect::<Result<BTreeMap<_, _>, ScraperError>>()?;

        Ok(Self {
            direct,
            proxied,
            proxy_urls: proxies.clone(),
            timeout,
            log_responses,
        })
    }

    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.request_timeout_secs,
            &config.proxies,
            config.log_responses,
        )
    }

    fn client_for(&self, proxy_country: Option<&str>) -> &Client {
        match proxy_country {
            Some(country) => self.proxied.get(country).unwrap_or_else(|| {
                tracing::debug!(proxy_country = country, "no proxy configured, sending directly");
                &self.direct
            }),
            None => &self.direct,
        }
    }

    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] on HTTP 429.
    /// - [`ScraperError::Http`] on network, proxy or timeout failures.
    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> Result<HttpResponse, ScraperError> {
        let request = self.client_for(options.proxy_country).get(url);
        send(request, url, options, self.log_responses).await
    }

    /// Sends an `application/x-www-form-urlencoded` POST.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::get`].
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        options: RequestOptions<'_>,
    ) -> Result<HttpResponse, ScraperError> {
        let request = self.client_for(options.proxy_country).post(url).form(form);
        send(request, url, options, self.log_responses).await
    }

    /// Opens a cookie-keeping session through the same proxy table.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the session client cannot be built.
    pub fn session(&self, proxy_country: Option<&str>) -> Result<Session, ScraperError> {
        let proxy = proxy_country.and_then(|c| self.proxy_urls.get(c));
        Ok(Session {
            client: build_client(self.timeout, proxy.map(String::as_str), true)?,
            log_responses: self.log_responses,
        })
    }
}

/// A client with its own cookie jar, for sources that hand out access
/// cookies on the first visit.
pub struct Session {
    client: Client,
    log_responses: bool,
}

impl Session {
    /// # Errors
    ///
    /// Same as [`HttpTransport::get`].
    pub async fn get(&self, url: &str, accept: Option<&str>) -> Result<HttpResponse, ScraperError> {
        let options = RequestOptions {
            accept,
            ..RequestOptions::default()
        };
        send(self.client.get(url), url, options, self.log_responses).await
    }

    /// # Errors
    ///
    /// Same as [`HttpTransport::get`].
    pub async fn post(&self, url: &str) -> Result<HttpResponse, ScraperError> {
        send(
            self.client.post(url),
            url,
            RequestOptions::default(),
            self.log_responses,
        )
        .await
    }
}

fn build_client(
    timeout: Duration,
    proxy_url: Option<&str>,
    cookie_store: bool,
) -> Result<Client, ScraperError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .cookie_store(cookie_store);
    if let Some(url) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }
    Ok(builder.build()?)
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_UA)
}

async fn send(
    mut request: RequestBuilder,
    url: &str,
    options: RequestOptions<'_>,
    log_responses: bool,
) -> Result<HttpResponse, ScraperError> {
    request = request.header(reqwest::header::USER_AGENT, random_user_agent());
    if let Some(cookies) = options.cookies {
        request = request.header(reqwest::header::COOKIE, cookies);
    }
    if let Some(token) = options.bearer_token {
        request = request.bearer_auth(token);
    }
    if let Some(accept) = options.accept {
        request = request.header(reqwest::header::ACCEPT, accept);
    }

    let response = request.send().await?;
    let status = response.status();
    let header_names: Vec<String> = if log_responses {
        response
            .headers()
            .keys()
            .map(|k| k.as_str().to_owned())
            .collect()
    } else {
        Vec::new()
    };
    let bytes = response.bytes().await?;

    tracing::info!(
        request_url = %redact_secrets(url),
        proxy_country = options.proxy_country.unwrap_or("none"),
        response_status_code = status.as_u16(),
        response_body_size_bytes = bytes.len(),
        response_headers = ?header_names,
        "make-request"
    );

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ScraperError::RateLimited {
            url: url.to_owned(),
        });
    }

    Ok(HttpResponse {
        status,
        url: url.to_owned(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
