use anyhow::{Context, Error, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const RETRY_DELAY_MS: u64 = 500;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts. Client
/// errors (4xx) are returned immediately.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                let client_error = err.status().is_some_and(|s| s.is_client_error());
                if client_error || attempt > retries {
                    return Err(err.into());
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Shared reqwest client plus the retry budget every provider uses.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retries: usize,
}

impl HttpClient {
    pub fn new(timeout: Duration, retries: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("actr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, retries })
    }

    /// GETs `url` and parses the body as JSON. Non-2xx statuses are errors.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        debug!("Requesting {}", redact(url));
        let response = with_retry(
            || async {
                let mut request = self.client.get(url);
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                request.send().await?.error_for_status()
            },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Request failed: {}", redact(url)))?;

        let body = response
            .text()
            .await
            .context("Failed to get response text")?;
        serde_json::from_str(&body).with_context(|| {
            format!("Failed to parse response from {}: '{body}'", redact(url))
        })
    }
}

// Credentials travel in query strings for some providers; keep them out of logs.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}
