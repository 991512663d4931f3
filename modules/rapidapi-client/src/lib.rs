pub mod error;
pub mod parser;
mod rate_limit;
pub mod types;

pub use error::{RapidApiError, Result};
pub use parser::{extract_next_cursor, extract_tweets, parse_tweet_detail};
pub use rate_limit::{RetryPolicy, DEFAULT_REQUEST_INTERVAL};
pub use types::{ArticleResult, Block, Card, MediaEntity, Metric, Tweet};

use std::time::Duration;

use rate_limit::RateLimiter;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_API_HOST: &str = "twitter241.p.rapidapi.com";

/// Page size requested from the list timeline endpoint.
const LIST_PAGE_SIZE: u32 = 20;

/// Pause between timeline pages, on top of the request interval.
const PAGE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TwitterClientConfig {
    pub api_key: String,
    pub api_host: String,
    pub timeout: Duration,
    pub request_interval: Duration,
    pub retry: RetryPolicy,
}

impl TwitterClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            timeout: Duration::from_secs(15),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct TwitterClient {
    client: reqwest::Client,
    api_key: String,
    api_host: String,
    base_url: String,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl TwitterClient {
    pub fn new(config: TwitterClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RapidApiError::Config("RapidAPI key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("https://{}", config.api_host),
            api_key: config.api_key,
            api_host: config.api_host,
            rate_limiter: RateLimiter::new(config.request_interval),
            retry: config.retry,
        })
    }

    /// Point the client at a different origin (mock servers, proxies).
    /// The `X-RapidAPI-Host` header keeps the configured host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch one page of a list timeline as raw JSON.
    pub async fn fetch_list_timeline(
        &self,
        list_id: &str,
        cursor: Option<&str>,
        count: u32,
    ) -> Result<Value> {
        let count = count.to_string();
        let mut query = vec![("listId", list_id), ("count", count.as_str())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        self.get_json("list-timeline", &query).await
    }

    /// Fetch a single tweet. `Ok(None)` when the response holds no decodable tweet.
    pub async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        let response = self.get_json("tweet-v2", &[("pid", tweet_id)]).await?;
        let tweet = parse_tweet_detail(&response);
        if tweet.is_none() {
            debug!(tweet_id, "Tweet detail response held no tweet");
        }
        Ok(tweet)
    }

    /// Walk a list timeline following bottom cursors.
    ///
    /// Stops when the cursor is missing or repeats, or after `max_pages`.
    /// A failure on the first page is returned; a failure on a later page ends
    /// pagination and returns what was collected.
    pub async fn fetch_all_list_pages(&self, list_id: &str, max_pages: u32) -> Result<Vec<Tweet>> {
        let mut all_tweets = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page = 0u32;

        while page < max_pages {
            let response = match self
                .fetch_list_timeline(list_id, cursor.as_deref(), LIST_PAGE_SIZE)
                .await
            {
                Ok(r) => r,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(list_id, page = page + 1, error = %e, "List page failed, keeping earlier pages");
                    break;
                }
            };

            let tweets = extract_tweets(&response);
            debug!(list_id, page = page + 1, count = tweets.len(), "Fetched list page");
            all_tweets.extend(tweets);
            page += 1;

            match extract_next_cursor(&response) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }

            if page < max_pages {
                tokio::time::sleep(PAGE_DELAY).await;
            }
        }

        info!(list_id, pages = page, count = all_tweets.len(), "Fetched list timeline");
        Ok(all_tweets)
    }

    /// GET with rate limiting and retry on 429, 5xx, and transport errors.
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            self.rate_limiter.wait().await;

            let sent = self
                .client
                .get(&url)
                .query(query)
                .header("X-RapidAPI-Key", &self.api_key)
                .header("X-RapidAPI-Host", &self.api_host)
                .send()
                .await;

            let resp = match sent {
                Ok(resp) => resp,
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_with_jitter(attempt);
                    warn!(path, attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %e, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = resp.status();
            if status.is_success() {
                let body = resp.bytes().await?;
                return Ok(serde_json::from_slice(&body)?);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_attempts {
                let delay = self.retry.delay_with_jitter(attempt);
                warn!(
                    path,
                    status = status.as_u16(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream throttled or failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(RapidApiError::RateLimited { attempts: attempt });
            }

            let message = resp.text().await.unwrap_or_default();
            return Err(RapidApiError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}
