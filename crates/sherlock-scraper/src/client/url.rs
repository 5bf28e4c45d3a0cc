//! URL helpers shared by the parsers and pipelines.

/// Extracts the scheme+host origin from a URL.
///
/// Given `"https://www.idealo.de/preisvergleich/OffersOfProduct/200557215"`,
/// returns `"https://www.idealo.de"`.
#[must_use]
pub fn extract_store_origin(url: &str) -> String {
    reqwest::Url::parse(url).map_or_else(
        |_| {
            url.trim_end_matches('/')
                .splitn(4, '/')
                .take(3)
                .collect::<Vec<_>>()
                .join("/")
        },
        |u| u.origin().ascii_serialization(),
    )
}

/// Resolves `href` against `base`, returning absolute hrefs unchanged.
#[must_use]
pub fn absolute_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    reqwest::Url::parse(base)
        .and_then(|b| b.join(href))
        .map_or_else(
            |_| format!("{}{href}", base.trim_end_matches('/')),
            |u| u.to_string(),
        )
}

/// Last non-empty path segment of an absolute or relative URL, without the
/// query string.
#[must_use]
pub fn last_path_segment(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/')
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Decoded value of query parameter `name`; relative URLs are accepted.
#[must_use]
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url)
        .or_else(|_| reqwest::Url::parse("https://relative.invalid/")?.join(url))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Masks credential query parameters (`token`) for logging.
#[must_use]
pub fn redact_secrets(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return url.to_owned();
    };
    if !parsed.query_pairs().any(|(k, _)| k == "token") {
        return url.to_owned();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "[redacted]".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
