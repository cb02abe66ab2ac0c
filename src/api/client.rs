//! Retrying API Client
//!
//! Issues paginated HTTP requests against the upstream legislative API
//! with bounded retries and exponential backoff. Rate limits (429) wait a
//! longer, rate-aware delay than ordinary 5xx failures; non-rate-limit
//! 4xx responses fail immediately without retry.
//!
//! The client holds no local state beyond the HTTP connection pool; all
//! sync bookkeeping lives in the sync tracker.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::{API_BASE_URL, DEFAULT_PAGE_SIZE};
use crate::types::{ErrorCategory, Result, SyncError};

// =============================================================================
// Configuration
// =============================================================================

/// Client configuration, populated from the `[api]` config section.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiClientConfig {
    /// Base URL of the upstream API.
    pub base_url: String,
    /// API key sent as a query parameter. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retry attempt ceiling for transient failures.
    pub max_retries: u32,
    /// Records per page for paginated endpoints.
    pub page_size: u32,
    /// Polite delay between page requests in milliseconds.
    pub page_delay_ms: u64,
}

impl std::fmt::Debug for ApiClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .field("page_delay_ms", &self.page_delay_ms)
            .finish()
    }
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
            page_size: DEFAULT_PAGE_SIZE,
            page_delay_ms: 500,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff schedule with a delay cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt with the given 1-based number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.max_delay)
    }
}

// =============================================================================
// API Client
// =============================================================================

/// Client for the upstream legislative API.
pub struct ApiClient {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
    retry: RetryPolicy,
    page_size: u32,
    page_delay: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiClientConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("No API key configured; upstream requests may be rejected");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SyncError::Http)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().map(SecretString::from),
            client,
            retry: RetryPolicy {
                max_attempts: config.max_retries.max(1),
                ..RetryPolicy::default()
            },
            page_size: config.page_size,
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    /// Resolve a path or absolute sub-resource URL against the base URL.
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn request_params(&self, params: &[(String, String)]) -> Vec<(String, String)> {
        let mut all: Vec<(String, String)> = params.to_vec();
        if !all.iter().any(|(k, _)| k == "format") {
            all.push(("format".into(), "json".into()));
        }
        if let Some(key) = &self.api_key {
            all.push(("api_key".into(), key.expose_secret().to_string()));
        }
        all
    }

    /// GET a single JSON response with retry.
    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.url_for(path);
        let all_params = self.request_params(params);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.retry.max_attempts {
            debug!(url = %url, attempt, "GET upstream");
            let outcome = self.client.get(&url).query(&all_params).send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(SyncError::Http);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let category = ErrorCategory::from_status(status.as_u16());
                    if !category.is_retryable() {
                        return Err(SyncError::upstream(status.as_u16(), body));
                    }

                    last_error = format!("HTTP {status}: {}", truncate(&body, 200));
                    if attempt < self.retry.max_attempts {
                        // 429 gets the rate-aware delay, 5xx the backoff curve
                        let wait = match category {
                            ErrorCategory::RateLimit => {
                                retry_after.unwrap_or_else(|| category.recommended_delay())
                            }
                            _ => self.retry.delay_for_attempt(attempt),
                        };
                        warn!(
                            url = %url,
                            attempt,
                            category = %category,
                            wait_ms = wait.as_millis() as u64,
                            "Upstream request failed, retrying"
                        );
                        sleep(wait).await;
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.retry.max_attempts {
                        let wait = self.retry.delay_for_attempt(attempt);
                        warn!(
                            url = %url,
                            attempt,
                            error = %e,
                            wait_ms = wait.as_millis() as u64,
                            "Upstream request errored, retrying"
                        );
                        sleep(wait).await;
                    }
                }
            }
        }

        Err(SyncError::UpstreamUnavailable {
            endpoint: path.to_string(),
            attempts: self.retry.max_attempts,
            message: last_error,
        })
    }

    /// GET all pages of a paginated endpoint, flattening the arrays found
    /// under `items_key` in each page.
    pub async fn get_paginated(
        &self,
        path: &str,
        params: &[(String, String)],
        items_key: &str,
    ) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut offset: u64 = params
            .iter()
            .find(|(k, _)| k == "offset")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);

        let mut page_params: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| k != "offset" && k != "limit")
            .cloned()
            .collect();
        page_params.push(("limit".into(), self.page_size.to_string()));
        page_params.push(("offset".into(), offset.to_string()));

        loop {
            let body = self.get(path, &page_params).await?;

            match body.get(items_key) {
                Some(Value::Array(items)) => all_items.extend(items.iter().cloned()),
                Some(other) => {
                    warn!(
                        items_key,
                        got = %json_type_name(other),
                        "Expected array in paginated response"
                    );
                }
                None => {}
            }

            if body.pointer("/pagination/next").is_none() {
                break;
            }

            offset += u64::from(self.page_size);
            if let Some(entry) = page_params.iter_mut().find(|(k, _)| k == "offset") {
                entry.1 = offset.to_string();
            }
            sleep(self.page_delay).await;
        }

        debug!(path, count = all_items.len(), "Paginated fetch complete");
        Ok(all_items)
    }

    /// Download a document body (bill text XML) with retry.
    pub async fn download_text(&self, url: &str) -> Result<String> {
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=self.retry.max_attempts {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.text().await.map_err(SyncError::Http);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !ErrorCategory::from_status(status).is_retryable() {
                        return Err(SyncError::upstream(status, format!("GET {url}")));
                    }
                    last_error = format!("HTTP {status}");
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < self.retry.max_attempts {
                sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }
        Err(SyncError::UpstreamUnavailable {
            endpoint: url.to_string(),
            attempts: self.retry.max_attempts,
            message: last_error,
        })
    }

    /// Cheap reachability probe used at run startup. A failure here is a
    /// run-level error, unlike mid-run upstream hiccups.
    pub async fn health_check(&self) -> Result<bool> {
        let params = [("limit".to_string(), "1".to_string())];
        match self.get("bill", &params).await {
            Ok(_) => Ok(true),
            Err(SyncError::Upstream { status, .. })
                if ErrorCategory::from_status(status) == ErrorCategory::Auth =>
            {
                Err(SyncError::Config(
                    "upstream API rejected the configured key".into(),
                ))
            }
            Err(e) => {
                warn!(error = %e, "Upstream health check failed");
                Ok(false)
            }
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(&ApiClientConfig {
            api_key: Some("test-key".into()),
            ..ApiClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(6),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(6));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(6));
    }

    #[test]
    fn test_url_for_relative_and_absolute() {
        let c = client();
        assert_eq!(
            c.url_for("bill/117/hr/21"),
            format!("{API_BASE_URL}/bill/117/hr/21")
        );
        assert_eq!(
            c.url_for("https://api.congress.gov/v3/bill/117/hr/21/actions"),
            "https://api.congress.gov/v3/bill/117/hr/21/actions"
        );
    }

    #[test]
    fn test_request_params_injects_key_and_format() {
        let c = client();
        let params = c.request_params(&[("sort".into(), "updateDate desc".into())]);
        assert!(params.iter().any(|(k, v)| k == "format" && v == "json"));
        assert!(params.iter().any(|(k, v)| k == "api_key" && v == "test-key"));
        assert!(params.iter().any(|(k, _)| k == "sort"));
    }

    #[test]
    fn test_request_params_keeps_explicit_format() {
        let c = client();
        let params = c.request_params(&[("format".into(), "xml".into())]);
        assert_eq!(
            params.iter().filter(|(k, _)| k == "format").count(),
            1,
            "explicit format must not be duplicated"
        );
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = ApiClientConfig {
            api_key: Some("secret-value".into()),
            ..ApiClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
