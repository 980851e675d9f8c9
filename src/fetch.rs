use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::FetchError;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Source of raw competitor HTML.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), latency_ms = start.elapsed().as_millis() as u64, "fetched");
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| transport_error(url, e))
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self.fetch_once(url).await;
            let status = match &result {
                Err(FetchError::Status { status, .. }) if should_retry(*status) => *status,
                _ => return result,
            };
            if attempt >= self.max_retries {
                return result;
            }

            let backoff = backoff_for(self.base_backoff, attempt);
            warn!(
                "HTTP {} from {} (attempt {}/{}), backing off {:.1}s",
                status,
                url,
                attempt + 1,
                self.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

fn should_retry(status: u16) -> bool {
    RETRY_STATUSES.contains(&status)
}

fn backoff_for(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt)
}
