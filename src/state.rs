//! Shared runtime singletons wired together once per process and handed to the
//! coordinator for a run. Builder-style construction mirrors the existing app-state
//! pattern; [`Debug`] is implemented by hand so logging this struct never leaks
//! proxy credentials.

use std::sync::Arc;

use crate::antibot::{AntiBot, RandomUserAgentProvider, RequestDelay, UserAgentProvider};
use crate::coordinator::CoordinatorDeps;
use crate::crawler::SiteCrawler;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::filters::{CookieConsentModalHandler, HeuristicPaywallDetector, ModalHandler, PaywallDetector};
use crate::hitl::HitlClient;
use crate::ingest::{IngestionClient, RpcIngestionClient};
use crate::proxy::ProxyPool;
use crate::sources::{InMemorySourceDirectory, SourceDirectory};
use crate::strategy::StrategySelector;

pub struct AppState {
    pub fetcher: Arc<dyn Fetcher>,
    pub proxy_pool: Option<Arc<ProxyPool>>,
    pub ua_provider: Arc<dyn UserAgentProvider>,
    pub modal_handler: Arc<dyn ModalHandler>,
    pub paywall_detector: Arc<dyn PaywallDetector>,
    pub hitl: Arc<HitlClient>,
    pub ingestion: Arc<dyn IngestionClient>,
    pub sources: Arc<dyn SourceDirectory>,
    pub strategy_selector: Arc<StrategySelector>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("proxy_pool_configured", &self.proxy_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds the default wiring: HTTP fetcher with UA rotation and stealth headers,
    /// no proxy pool, cookie-consent modal handling, heuristic paywall detection, the
    /// RPC ingestion client, and an in-memory source directory.
    pub fn build() -> Self {
        let config = crate::core::config::get_crawling_config();

        let ua_provider: Arc<dyn UserAgentProvider> = Arc::new(RandomUserAgentProvider);

        let proxy_pool = if config.enhancements.enable_proxy_pool && !config.proxy_pool.is_empty() {
            Some(Arc::new(ProxyPool::new(config.proxy_pool.clone())))
        } else {
            None
        };

        let mut http_fetcher = HttpFetcher::new(reqwest::Client::new());
        if config.enhancements.enable_user_agent_rotation {
            http_fetcher = http_fetcher.with_user_agent_provider(Arc::clone(&ua_provider));
        }
        if let Some(pool) = &proxy_pool {
            http_fetcher = http_fetcher.with_proxy_pool(Arc::clone(pool));
        }
        if !config.enhancements.enable_stealth_headers {
            http_fetcher = http_fetcher.without_stealth_headers();
        }
        if config.enhancements.enable_rate_limiting {
            http_fetcher = http_fetcher.with_rate_limiter(Arc::new(AntiBot::new(RequestDelay::default_polite())));
        }

        let fetcher: Arc<dyn Fetcher> = Arc::new(http_fetcher);

        let modal_handler: Arc<dyn ModalHandler> = Arc::new(CookieConsentModalHandler {
            cookie_name: config.consent_cookie.cookie_name.clone().unwrap_or_else(|| "justnews_cookie_consent".to_string()),
            cookie_value: config.consent_cookie.cookie_value.clone().unwrap_or_else(|| "1".to_string()),
        });

        let paywall_detector: Arc<dyn PaywallDetector> = Arc::new(HeuristicPaywallDetector::default());

        AppState {
            fetcher,
            proxy_pool,
            ua_provider,
            modal_handler,
            paywall_detector,
            hitl: Arc::new(HitlClient::new()),
            ingestion: Arc::new(RpcIngestionClient::new()),
            sources: Arc::new(InMemorySourceDirectory::default()),
            strategy_selector: Arc::new(StrategySelector::new(Vec::new(), Vec::new())),
        }
    }

    pub fn crawler(&self) -> SiteCrawler {
        SiteCrawler::new(Arc::clone(&self.fetcher))
            .with_modal_handler(Arc::clone(&self.modal_handler))
            .with_paywall_detector(Arc::clone(&self.paywall_detector))
    }

    pub fn coordinator_deps(&self) -> CoordinatorDeps {
        CoordinatorDeps {
            crawler: Arc::new(self.crawler()),
            strategy_selector: Arc::clone(&self.strategy_selector),
            hitl: Arc::clone(&self.hitl),
            ingestion: Arc::clone(&self.ingestion),
            sources: Arc::clone(&self.sources),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_does_not_leak_internals() {
        let state = AppState::build();
        let rendered = format!("{state:?}");
        assert!(rendered.contains("AppState"));
    }
}
