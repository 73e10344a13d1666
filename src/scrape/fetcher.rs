use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::error::Result;

use super::PageSource;

/// A successfully fetched page. `url` is the final URL after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {url} failed after {attempts} attempt(s): {reason}")]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

/// Single-shot HTTP GET with a fixed number of constant-interval retries.
pub struct PageFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl PageFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
        })
    }

    pub async fn fetch(&self, url: &str) -> std::result::Result<RawPage, FetchFailure> {
        retry_fixed(url, self.max_retries, self.retry_delay, move || self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<RawPage, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| describe(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| describe(&e))?;

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<RawPage, FetchFailure> {
        PageFetcher::fetch(self, url).await
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

/// Runs `attempt` once plus up to `max_retries` more times, sleeping `delay` between attempts.
pub(crate) async fn retry_fixed<T, F, Fut>(
    url: &str,
    max_retries: u32,
    delay: Duration,
    mut attempt: F,
) -> std::result::Result<T, FetchFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(url, attempts, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(reason) if attempts > max_retries => {
                tracing::warn!(url, attempts, %reason, "giving up on fetch");
                return Err(FetchFailure {
                    url: url.to_string(),
                    reason,
                    attempts,
                });
            }
            Err(reason) => {
                tracing::debug!(url, attempts, %reason, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
