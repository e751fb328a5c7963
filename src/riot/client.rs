use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::riot::metrics::RequestMetrics;
use crate::riot::region::{Platform, Region};

/// Backoff used when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// HTTP client for the Riot API and Data Dragon.
#[derive(Clone)]
pub struct RiotClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    /// Riot API Key
    key: String,
    /// Replaces the platform/regional hosts when set.
    base_url_override: Option<String>,
    ddragon_base_url: String,
    ddragon_version: String,
    metrics: Arc<RequestMetrics>,
}

impl std::fmt::Debug for RiotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiotClient")
            .field("base_url_override", &self.base_url_override)
            .field("ddragon_version", &self.ddragon_version)
            .field("requests", &self.metrics.total())
            .finish()
    }
}

impl RiotClient {
    pub fn new(
        key: String,
        rate_limit_per_second: NonZeroU32,
        ddragon_base_url: String,
        ddragon_version: String,
    ) -> Self {
        let quota = Quota::per_second(rate_limit_per_second);

        Self {
            client: reqwest::Client::new(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            key,
            base_url_override: None,
            ddragon_base_url: ddragon_base_url.trim_end_matches('/').to_string(),
            ddragon_version,
            metrics: RequestMetrics::new("riot"),
        }
    }

    /// Send every Riot API request to `base_url` instead of the routing hosts.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn metrics(&self) -> Arc<RequestMetrics> {
        self.metrics.clone()
    }

    /// Spawn a task logging periodic metrics about requests.
    pub fn start_metrics_logging(&self) -> tokio::task::JoinHandle<()> {
        let metrics = self.metrics.clone();
        tokio::spawn(async move { metrics.log_loop().await })
    }

    pub(crate) fn regional_url(&self, region: Region, path: &str) -> String {
        match &self.base_url_override {
            Some(base) => format!("{base}{path}"),
            None => format!("{}{path}", region.base_url()),
        }
    }

    pub(crate) fn platform_url(&self, platform: Platform, path: &str) -> String {
        match &self.base_url_override {
            Some(base) => format!("{base}{path}"),
            None => format!("{}{path}", platform.base_url()),
        }
    }

    pub(crate) fn ddragon_url(&self, path: &str) -> String {
        format!(
            "{}/cdn/{}{path}",
            self.ddragon_base_url, self.ddragon_version
        )
    }

    /// Authenticated GET against the Riot API.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        // Ensure we do not exceed the Riot API rate limits before doing any request
        self.limiter.until_ready().await;
        self.metrics.inc();

        debug!(url, "🛰️ GET");
        let res = self
            .client
            .get(url)
            .header("X-Riot-Token", &self.key)
            .send()
            .await?;

        self.decode(res).await
    }

    /// Unauthenticated GET for static Data Dragon files.
    pub(crate) async fn get_static<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        debug!(url, "🛰️ GET static");
        let res = self.client.get(url).send().await?;

        self.decode(res).await
    }

    async fn decode<T: DeserializeOwned>(&self, res: reqwest::Response) -> Result<T, AppError> {
        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            StatusCode::TOO_MANY_REQUESTS => {
                self.metrics.inc_rate_limited();
                let retry_after = res
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                warn!(retry_after_secs = retry_after.as_secs(), "🛰️ ⚠️ Rate limited");
                Err(AppError::RateLimited { retry_after })
            }
            status => {
                let message = res.text().await.unwrap_or_default();
                Err(AppError::RiotApi {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
