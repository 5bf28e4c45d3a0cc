//! PriceAPI job client used to look up Idealo product ids by GTIN.
//!
//! A lookup is a job: create it, poll its status until it is `finished` or
//! `cancelled`, then download the results.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::client::RequestOptions;
use crate::context::ScrapeContext;
use crate::error::ScraperError;

/// How often and how long to poll a job.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1200),
            max_wait: Duration::from_secs(240),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedJob {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobResults {
    results: Vec<JobResult>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    query: JobQuery,
    success: bool,
    reason: Option<String>,
    content: Option<JobContent>,
}

#[derive(Debug, Deserialize)]
struct JobQuery {
    value: String,
}

#[derive(Debug, Deserialize)]
struct JobContent {
    id: Option<serde_json::Value>,
}

/// Finds Idealo's product id for `gtin`, `None` when PriceAPI reports no
/// match.
///
/// # Errors
///
/// - [`ScraperError::MissingCredential`] without `PRICEAPI_API_KEY`.
/// - [`ScraperError::PriceApi`] when the job is cancelled or times out.
/// - [`ScraperError::UnexpectedStatus`] / [`ScraperError::Http`] /
///   [`ScraperError::Deserialize`] on API failures.
pub async fn find_product_id(
    ctx: &ScrapeContext,
    gtin: &str,
    poll: PollSettings,
) -> Result<Option<String>, ScraperError> {
    let token = ctx
        .config
        .priceapi_api_key
        .as_deref()
        .ok_or(ScraperError::MissingCredential("PRICEAPI_API_KEY"))?;
    let jobs_url = format!("{}/v2/jobs", ctx.endpoints.priceapi);

    let created: CreatedJob = ctx
        .transport
        .post_form(
            &jobs_url,
            &[
                ("token", token),
                ("country", "de"),
                ("source", "idealo"),
                ("topic", "product_and_offers"),
                ("key", "gtin"),
                ("values", gtin),
                ("max_pages", "1"),
            ],
            RequestOptions::default(),
        )
        .await?
        .error_for_status()?
        .json("PriceAPI job creation")?;
    let job_id = created.job_id;
    tracing::info!(gtin, job_id = %job_id, "created PriceAPI job");

    let status = wait_for_completion(ctx, &jobs_url, &job_id, token, poll).await?;
    if status == "cancelled" {
        return Err(ScraperError::PriceApi(format!(
            "job {job_id} was cancelled and received no data"
        )));
    }

    let results: JobResults = ctx
        .transport
        .get(
            &format!("{jobs_url}/{job_id}/download?token={token}"),
            RequestOptions::default(),
        )
        .await?
        .error_for_status()?
        .json("PriceAPI job results")?;

    Ok(product_id_from_results(results, gtin))
}

async fn wait_for_completion(
    ctx: &ScrapeContext,
    jobs_url: &str,
    job_id: &str,
    token: &str,
    poll: PollSettings,
) -> Result<String, ScraperError> {
    let started = Instant::now();
    while started.elapsed() < poll.max_wait {
        tokio::time::sleep(poll.interval).await;
        let status: JobStatus = ctx
            .transport
            .get(
                &format!("{jobs_url}/{job_id}?token={token}"),
                RequestOptions::default(),
            )
            .await?
            .error_for_status()?
            .json("PriceAPI job status")?;
        tracing::debug!(job_id, status = %status.status, "polled PriceAPI job");
        if matches!(status.status.as_str(), "finished" | "cancelled") {
            return Ok(status.status);
        }
    }
    Err(ScraperError::PriceApi(format!(
        "job {job_id} did not finish within {}s",
        poll.max_wait.as_secs()
    )))
}

fn product_id_from_results(results: JobResults, gtin: &str) -> Option<String> {
    let result = results
        .results
        .into_iter()
        .find(|r| r.query.value == gtin)?;

    if !result.success {
        let reason = result.reason.as_deref().unwrap_or("unknown");
        if reason == "to_be_searched" {
            tracing::warn!(gtin, "PriceAPI does not have data for this product yet");
        } else {
            tracing::error!(gtin, reason, "PriceAPI lookup failed");
        }
        return None;
    }
    if result.reason.as_deref() == Some("not found") {
        tracing::warn!(gtin, "PriceAPI says the product does not exist");
        return None;
    }

    let raw = match result.content?.id? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let cleaned = clean_product_id(&raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Keeps the leading digits: `"2149589_-17-50mm-f2-8"` becomes `"2149589"`.
#[must_use]
pub fn clean_product_id(raw: &str) -> String {
    raw.chars().take_while(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(json: serde_json::Value) -> JobResults {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn clean_product_id_keeps_leading_digits() {
        assert_eq!(
            clean_product_id("2149589_-17-50mm-f2-8-ex-dc-os-hsm-canon-sigma-foto"),
            "2149589"
        );
        assert_eq!(clean_product_id("200557215"), "200557215");
    }

    #[test]
    fn successful_result_yields_cleaned_id() {
        let r = results(serde_json::json!({
            "results": [{
                "query": {"value": "4002515289693"},
                "success": true,
                "content": {"id": "200557215_-bosch-serie-6"}
            }]
        }));
        assert_eq!(
            product_id_from_results(r, "4002515289693").as_deref(),
            Some("200557215")
        );
    }

    #[test]
    fn not_found_reason_yields_none() {
        let r = results(serde_json::json!({
            "results": [{
                "query": {"value": "4002515289693"},
                "success": true,
                "reason": "not found",
                "content": {}
            }]
        }));
        assert_eq!(product_id_from_results(r, "4002515289693"), None);
    }

    #[test]
    fn failed_result_yields_none() {
        let r = results(serde_json::json!({
            "results": [{
                "query": {"value": "4002515289693"},
                "success": false,
                "reason": "to_be_searched"
            }]
        }));
        assert_eq!(product_id_from_results(r, "4002515289693"), None);
    }
}
