//! Shared HTTP plumbing for oracle adapters.
//!
//! - Token-bucket rate limiting per oracle via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` support (max 3 retries).
//! - `404 Not Found` maps to `Ok(None)`: the service has nothing for us.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const MAX_RETRY_WAIT_SECS: u64 = 10;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited JSON client for one oracle.
pub struct OracleHttp {
    service: &'static str,
    client: reqwest::Client,
    rate_limiter: DirectLimiter,
}

impl OracleHttp {
    pub fn new(
        service: &'static str,
        timeout: Duration,
        requests_per_second: u32,
        default_headers: HeaderMap,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .user_agent(concat!("skipsplice/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| format!("failed to build HTTP client for {service}"))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            service,
            client,
            rate_limiter,
        })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Option<T>> {
        self.send_json(|| self.client.get(url).query(query), url)
            .await
    }

    /// POST a JSON body to `url` and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> anyhow::Result<Option<T>> {
        self.send_json(|| self.client.post(url).json(body), url)
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> RequestBuilder,
        url: &str,
    ) -> anyhow::Result<Option<T>> {
        let service = self.service;
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = build()
                .send()
                .await
                .with_context(|| format!("{service} request failed: {url}"))?;

            match resp.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::TOO_MANY_REQUESTS if retries < MAX_RETRIES => {
                    retries += 1;
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1)
                        .min(MAX_RETRY_WAIT_SECS);
                    warn!(
                        service,
                        retry = retries,
                        wait_secs = wait,
                        "Oracle returned 429, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    continue;
                }
                _ => {}
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("{service} request returned error: {url}"))?;

            let body = resp
                .json::<T>()
                .await
                .with_context(|| format!("{service} returned malformed JSON: {url}"))?;

            return Ok(Some(body));
        }
    }
}
