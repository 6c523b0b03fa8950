use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use sitecrawl::budget::BudgetArbiter;
use sitecrawl::core::types::{ArticleRecord, SiteConfig};
use sitecrawl::coordinator::{self, CoordinatorDeps};
use sitecrawl::crawler::SiteCrawler;
use sitecrawl::fetcher::{FetchError, Fetcher};
use sitecrawl::filters::{HeuristicPaywallDetector, PaywallDetection, PaywallDetector};
use sitecrawl::hitl::HitlClient;
use sitecrawl::ingest::{IngestOutcome, IngestionClient};
use sitecrawl::sources::{InMemorySourceDirectory, SourceDirectory};
use sitecrawl::strategy::StrategySelector;

const LONG_BODY: &str = "word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word";

struct FakeFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().ok_or_else(|| FetchError::HttpStatus(404))
    }
}

fn landing_page(links: &[&str]) -> String {
    let anchors: String = links.iter().map(|l| format!("<a href=\"{l}\">link</a>")).collect();
    format!("<html><body>{anchors}</body></html>")
}

fn article_page(title: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><article><p>{LONG_BODY}</p></article></body></html>")
}

fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

fn site_config(domain: &str) -> SiteConfig {
    SiteConfig {
        source_id: None,
        name: domain.to_string(),
        domain: domain.to_string(),
        start_url: format!("https://{domain}/"),
        metadata: HashMap::new(),
        crawling_strategy: "generic".to_string(),
    }
}

/// Always returns `New` the first time a normalized URL is seen, `Duplicate` after.
struct DedupingIngestion {
    seen: Mutex<HashSet<String>>,
}

impl DedupingIngestion {
    fn new() -> Self {
        DedupingIngestion { seen: Mutex::new(HashSet::new()) }
    }
}

#[async_trait]
impl IngestionClient for DedupingIngestion {
    async fn ingest(&self, article: &ArticleRecord) -> IngestOutcome {
        let mut seen = self.seen.lock().await;
        if seen.insert(article.normalized_url.clone()) {
            IngestOutcome::New
        } else {
            IngestOutcome::Duplicate
        }
    }
}

struct AlwaysDuplicateIngestion;

#[async_trait]
impl IngestionClient for AlwaysDuplicateIngestion {
    async fn ingest(&self, _article: &ArticleRecord) -> IngestOutcome {
        IngestOutcome::Duplicate
    }
}

struct AlwaysPaywalled;

#[async_trait]
impl PaywallDetector for AlwaysPaywalled {
    async fn analyze(&self, _url: &str, _html: &str, _text: Option<&str>) -> PaywallDetection {
        PaywallDetection {
            is_paywall: true,
            confidence: 0.9,
            reasons: vec!["forced".to_string()],
            should_skip: true,
        }
    }
}

fn deps_with(fetcher: FakeFetcher, ingestion: Arc<dyn IngestionClient>, sources: Vec<SiteConfig>) -> CoordinatorDeps {
    deps_with_detector(fetcher, ingestion, sources, Arc::new(HeuristicPaywallDetector::default()))
}

fn deps_with_detector(
    fetcher: FakeFetcher,
    ingestion: Arc<dyn IngestionClient>,
    sources: Vec<SiteConfig>,
    paywall_detector: Arc<dyn PaywallDetector>,
) -> CoordinatorDeps {
    std::env::set_var("ENABLE_HITL_PIPELINE", "false");
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
    let crawler = Arc::new(SiteCrawler::new(Arc::clone(&fetcher)).with_paywall_detector(paywall_detector));
    CoordinatorDeps {
        crawler,
        strategy_selector: Arc::new(StrategySelector::new(Vec::new(), Vec::new())),
        hitl: Arc::new(HitlClient::new()),
        ingestion,
        sources: Arc::new(InMemorySourceDirectory::new(sources)),
    }
}

#[tokio::test]
async fn s1_single_new_article_no_global_cap() {
    let mut pages = HashMap::new();
    pages.insert("https://example.com/".to_string(), landing_page(&["https://example.com/2024/03/01/a-big-story"]));
    pages.insert("https://example.com/2024/03/01/a-big-story".to_string(), article_page("Story"));

    let deps = deps_with(FakeFetcher { pages }, Arc::new(DedupingIngestion::new()), vec![site_config("example.com")]);

    let summary = coordinator::run(vec!["example.com".to_string()], 1, 1, None, HashMap::new(), deps, None, no_shutdown()).await;

    assert_eq!(summary.sites_crawled, 1);
    assert_eq!(summary.total_articles, 1);
    assert_eq!(summary.duplicates_skipped, 0);
    assert_eq!(summary.ingestion_errors, 0);
    assert_eq!(summary.articles.len(), 1);
    assert_eq!(summary.site_exhaustion.get("example.com").map(String::as_str), Some("limit_reached"));
}

#[tokio::test]
async fn s2_duplicate_detection() {
    let mut pages = HashMap::new();
    pages.insert("https://example.com/".to_string(), landing_page(&["https://example.com/2024/03/01/a-big-story"]));
    pages.insert("https://example.com/2024/03/01/a-big-story".to_string(), article_page("Story"));

    let deps = deps_with(FakeFetcher { pages }, Arc::new(AlwaysDuplicateIngestion), vec![site_config("example.com")]);

    let summary = coordinator::run(vec!["example.com".to_string()], 1, 1, None, HashMap::new(), deps, None, no_shutdown()).await;

    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.total_articles, 0);
    assert_eq!(summary.site_duplicate_breakdown.get("example.com"), Some(&1));
    assert_eq!(summary.site_exhaustion.get("example.com").map(String::as_str), Some("ingestion_stalled"));
}

#[tokio::test]
async fn s3_global_budget_across_two_sites() {
    let links_a: Vec<String> = (0..5).map(|i| format!("https://a.example.com/2024/03/0{i}/story-a")).collect();
    let links_b: Vec<String> = (0..5).map(|i| format!("https://b.example.com/2024/03/0{i}/story-b")).collect();

    let mut pages = HashMap::new();
    pages.insert("https://a.example.com/".to_string(), landing_page(&links_a.iter().map(String::as_str).collect::<Vec<_>>()));
    pages.insert("https://b.example.com/".to_string(), landing_page(&links_b.iter().map(String::as_str).collect::<Vec<_>>()));
    for link in links_a.iter().chain(links_b.iter()) {
        pages.insert(link.clone(), article_page("Story"));
    }

    let deps = deps_with(
        FakeFetcher { pages },
        Arc::new(DedupingIngestion::new()),
        vec![site_config("a.example.com"), site_config("b.example.com")],
    );

    let summary = coordinator::run(
        vec!["a.example.com".to_string(), "b.example.com".to_string()],
        5,
        2,
        Some(3),
        HashMap::new(),
        deps,
        None,
        no_shutdown(),
    )
    .await;

    assert_eq!(summary.total_articles, 3);
    assert!(summary.global_target_reached);
    let site_sum: usize = summary.site_breakdown.values().sum();
    assert_eq!(site_sum, 3);
}

#[tokio::test]
async fn s5_paywalled_site_escalation() {
    let links: Vec<String> = (0..3).map(|i| format!("https://paywalled.example.com/2024/03/0{i}/story")).collect();
    let mut pages = HashMap::new();
    pages.insert("https://paywalled.example.com/".to_string(), landing_page(&links.iter().map(String::as_str).collect::<Vec<_>>()));
    for link in &links {
        pages.insert(link.clone(), article_page("Story"));
    }

    let deps = deps_with_detector(
        FakeFetcher { pages },
        Arc::new(DedupingIngestion::new()),
        vec![site_config("paywalled.example.com")],
        Arc::new(AlwaysPaywalled),
    );

    let summary = coordinator::run(vec!["paywalled.example.com".to_string()], 3, 1, None, HashMap::new(), deps, None, no_shutdown()).await;

    assert_eq!(summary.total_articles, 0);
    assert_eq!(summary.total_paywalls_detected, 3);
    assert_eq!(summary.site_exhaustion.get("paywalled.example.com").map(String::as_str), Some("paywalls_only"));
}

#[tokio::test]
async fn budget_restore_on_shortfall_lets_other_sites_use_it() {
    let arbiter = BudgetArbiter::new(Some(2));
    assert_eq!(arbiter.reserve(2).await, 2);
    arbiter.restore(1).await;
    assert_eq!(arbiter.reserve(1).await, 1);
    assert_eq!(arbiter.reserve(1).await, 0);
}
