//! Issues a single HTTP GET with UA/proxy/stealth header selection and classifies
//! failures into recoverable vs fatal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::antibot::{get_random_user_agent, get_stealth_headers, AntiBot, UserAgentProvider};
use crate::proxy::ProxyPool;

/// Error message substrings that are eligible for retry with linear backoff.
/// Fragile by design — matches observed behavior rather than a structured error kind.
const RECOVERABLE_MARKERS: &[&str] = &[
    "browsercontext.new_page",
    "connection closed while reading from the driver",
    "pipe closed by peer",
];

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_UNIT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Substring classification. HTTP 4xx/5xx outside the marker set are
    /// non-retryable regardless of status code.
    pub fn is_recoverable(&self) -> bool {
        is_recoverable_message(&self.to_string())
    }
}

pub fn is_recoverable_message(message: &str) -> bool {
    RECOVERABLE_MARKERS.iter().any(|marker| message.contains(marker))
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    ua_provider: Option<Arc<dyn UserAgentProvider>>,
    proxy_pool: Option<Arc<ProxyPool>>,
    stealth_headers_enabled: bool,
    rate_limiter: Option<Arc<AntiBot>>,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpFetcher {
            client,
            ua_provider: None,
            proxy_pool: None,
            stealth_headers_enabled: true,
            rate_limiter: None,
        }
    }

    pub fn with_user_agent_provider(mut self, provider: Arc<dyn UserAgentProvider>) -> Self {
        self.ua_provider = Some(provider);
        self
    }

    pub fn with_proxy_pool(mut self, pool: Arc<ProxyPool>) -> Self {
        self.proxy_pool = Some(pool);
        self
    }

    pub fn without_stealth_headers(mut self) -> Self {
        self.stealth_headers_enabled = false;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<AntiBot>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait_for_next_request().await;
        }

        let domain = url::Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?
            .host_str()
            .unwrap_or("")
            .to_string();

        let user_agent = self
            .ua_provider
            .as_ref()
            .map(|p| p.user_agent_for(&domain).to_string())
            .unwrap_or_else(|| get_random_user_agent().to_string());

        let proxy_url = match &self.proxy_pool {
            Some(pool) => pool.next_proxy().await,
            None => None,
        };

        let client = if let Some(proxy_url) = &proxy_url {
            reqwest::Client::builder()
                .proxy(reqwest::Proxy::all(proxy_url).map_err(FetchError::Transport)?)
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(FetchError::Transport)?
        } else {
            self.client.clone()
        };

        let mut request = client.get(url).header("User-Agent", &user_agent);
        if self.stealth_headers_enabled {
            for (name, value) in get_stealth_headers() {
                request = request.header(name, value);
            }
        }

        let result = request.timeout(Duration::from_secs(10)).send().await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() >= 400 {
                    if let Some(pool) = &self.proxy_pool {
                        if let Some(proxy_url) = &proxy_url {
                            pool.report_failure(proxy_url).await;
                        }
                    }
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                if let (Some(pool), Some(proxy_url)) = (&self.proxy_pool, &proxy_url) {
                    pool.report_success(proxy_url).await;
                }
                response.text().await.map_err(FetchError::Transport)
            }
            Err(err) => {
                if let Some(pool) = &self.proxy_pool {
                    if let Some(proxy_url) = &proxy_url {
                        pool.report_failure(proxy_url).await;
                    }
                }
                Err(FetchError::Transport(err))
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches `url`, retrying recoverable failures up to [`MAX_RETRY_ATTEMPTS`] times
    /// with `0.5s * attempt` linear backoff.
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(html) => return Ok(html),
                Err(err) if err.is_recoverable() && attempt < MAX_RETRY_ATTEMPTS => {
                    let backoff = RETRY_BACKOFF_UNIT * attempt;
                    tracing::warn!(url, attempt, ?backoff, "recoverable fetch error, retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
