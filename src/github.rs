use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CollectorError, Result};

pub const JSON_ACCEPT: &str = "application/vnd.github.v3+json";
pub const RAW_ACCEPT: &str = "application/vnd.github.v3.raw";

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// HTTP client for APIs that signal rate limiting through the standard
/// `x-ratelimit-*` response headers. When the remaining quota hits zero, or
/// the server answers 403, the client sleeps until the advertised reset time
/// and retries the same request instead of surfacing an error. Any other
/// failure propagates immediately.
pub struct GithubClient {
    client: reqwest::Client,
    token: Option<String>,
    max_waits: Option<u32>,
}

impl GithubClient {
    /// `max_waits` bounds how many rate-limit pauses a single request may
    /// take before giving up with [`CollectorError::RateLimited`]; `None`
    /// retries for as long as the server keeps saying wait, which is fine
    /// for a scheduled batch job.
    pub fn new(token: Option<String>, max_waits: Option<u32>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            max_waits,
        }
    }

    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get(url, JSON_ACCEPT).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches a resource with the raw accept header, e.g. file contents
    /// through the contents API.
    pub async fn get_raw(&self, url: &str) -> Result<String> {
        self.get(url, RAW_ACCEPT).await
    }

    async fn get(&self, url: &str, accept: &str) -> Result<String> {
        let mut waits = 0u32;
        loop {
            let mut request = self.client.get(url).header(ACCEPT, accept);
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("token {token}"));
            }
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::FORBIDDEN {
                let wait = wait_until_reset(
                    reset_epoch(response.headers()),
                    Utc::now().timestamp_millis(),
                );
                warn!(
                    "403 from {} (likely rate limit), waiting {}s before retry",
                    url,
                    wait.as_secs()
                );
                self.record_wait(url, &mut waits)?;
                tokio::time::sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                return Err(CollectorError::Api {
                    message: format!("{url} returned status {status}"),
                });
            }

            let remaining = response
                .headers()
                .get(REMAINING_HEADER)
                .and_then(|v| v.to_str().ok());
            if remaining == Some("0") {
                let wait = wait_until_reset(
                    reset_epoch(response.headers()),
                    Utc::now().timestamp_millis(),
                );
                info!(
                    "rate limit exhausted, waiting {}s before retrying {}",
                    wait.as_secs(),
                    url
                );
                self.record_wait(url, &mut waits)?;
                tokio::time::sleep(wait).await;
                continue;
            }

            return Ok(response.text().await?);
        }
    }

    fn record_wait(&self, url: &str, waits: &mut u32) -> Result<()> {
        *waits += 1;
        if let Some(cap) = self.max_waits {
            if *waits > cap {
                return Err(CollectorError::RateLimited {
                    url: url.to_string(),
                    waits: cap,
                });
            }
        }
        Ok(())
    }
}

fn reset_epoch(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Time to sleep before retrying: until the advertised reset epoch plus a
/// one-second safety margin. A reset already in the past, or a missing
/// header, still waits the margin.
pub fn wait_until_reset(reset_epoch_secs: Option<i64>, now_ms: i64) -> Duration {
    let until_ms = reset_epoch_secs
        .map(|reset| reset * 1000 - now_ms)
        .unwrap_or(0)
        .max(0);
    Duration::from_millis(until_ms as u64 + 1000)
}
