//! Site Crawler (C4): fetches a site's landing page, discovers article links, and
//! fetches each one under a bounded semaphore to build [`ArticleRecord`]s.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;

use crate::core::config::url_normalization_mode;
use crate::core::types::{ArticleRecord, ExtractionMetadata, IngestionStatus, ModalHandlerTelemetry, PaywallTelemetry, SiteConfig};
use crate::extract;
use crate::fetcher::Fetcher;
use crate::filters::{ModalHandler, PaywallDetector};
use crate::url_norm::{hash_article_url, normalize_article_url};

const MAX_LINKS: usize = 50;
const MIN_ARTICLE_SEGMENT_LEN: usize = 5;
const MAX_CONTENT_CHARS: usize = 10_000;

/// Major-publisher section prefixes that are treated as article paths regardless of
/// the generic year/fragment heuristics below.
const KNOWN_SECTION_PREFIXES: &[&str] = &["/world/", "/politics/", "/business/", "/technology/", "/sports/", "/opinion/"];

fn looks_like_article_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();

    if KNOWN_SECTION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        if let Some(last_segment) = lower.trim_end_matches('/').rsplit('/').next() {
            if last_segment.len() > MIN_ARTICLE_SEGMENT_LEN {
                return true;
            }
        }
    }

    let year_pattern = Regex::new(r"/(19|20)\d{2}/").unwrap();
    if year_pattern.is_match(&lower) {
        return true;
    }

    lower.contains("/article/") || lower.contains("/story/") || lower.contains("/news/")
}

fn same_registrable_domain(candidate_host: &str, site_domain: &str) -> bool {
    let candidate = candidate_host.trim_start_matches("www.");
    let site = site_domain.trim_start_matches("www.");
    candidate.eq_ignore_ascii_case(site)
}

/// Parses `<a href>` targets from `html`, absolutised against `base_url`, kept only
/// when they stay on the site's domain and look like article paths. Deduplicated
/// preserving discovery order, capped at [`MAX_LINKS`].
pub fn discover_article_links(html: &str, base_url: &str, site_domain: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else { continue };
        let Ok(absolute) = base.join(href) else { continue };
        let Some(host) = absolute.host_str() else { continue };
        if !same_registrable_domain(host, site_domain) {
            continue;
        }
        if !looks_like_article_path(absolute.path()) {
            continue;
        }

        let absolute_str = absolute.to_string();
        if seen.insert(absolute_str.clone()) {
            links.push(absolute_str);
        }
        if links.len() >= MAX_LINKS {
            break;
        }
    }

    links
}

pub struct SiteCrawler {
    fetcher: Arc<dyn Fetcher>,
    modal_handler: Option<Arc<dyn ModalHandler>>,
    paywall_detector: Option<Arc<dyn PaywallDetector>>,
    concurrent_browsers: usize,
}

impl SiteCrawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        SiteCrawler {
            fetcher,
            modal_handler: None,
            paywall_detector: None,
            concurrent_browsers: 3,
        }
    }

    pub fn with_modal_handler(mut self, handler: Arc<dyn ModalHandler>) -> Self {
        self.modal_handler = Some(handler);
        self
    }

    pub fn with_paywall_detector(mut self, detector: Arc<dyn PaywallDetector>) -> Self {
        self.paywall_detector = Some(detector);
        self
    }

    /// `concurrent_browsers` bounds this crawler's own per-link fan-out; the
    /// coordinator's own semaphore separately bounds how many sites run at once.
    pub fn with_concurrent_browsers(mut self, n: usize) -> Self {
        self.concurrent_browsers = n.max(1);
        self
    }

    async fn build_article(&self, url: &str, html: &str, site: &SiteConfig) -> Option<ArticleRecord> {
        let outcome = extract::extract(html, url);
        if outcome.text.trim().is_empty() {
            return None;
        }

        let canonical = outcome.canonical_url.clone().unwrap_or_else(|| url.to_string());
        let normalized_url = normalize_article_url(url, Some(&canonical), Some(url_normalization_mode()));
        let url_hash = hash_article_url(&normalized_url, None).unwrap_or_default();

        let paywall = match &self.paywall_detector {
            Some(detector) => Some(detector.analyze(url, html, Some(&outcome.text)).await),
            None => None,
        };

        let skip_ingest = paywall.as_ref().map(|p| p.should_skip).unwrap_or(false);
        let paywall_flag = paywall.as_ref().map(|p| p.is_paywall).unwrap_or(false);

        Some(ArticleRecord {
            url: url.to_string(),
            canonical,
            normalized_url,
            url_hash,
            title: outcome.title.clone().unwrap_or_default(),
            content: outcome.text.chars().take(MAX_CONTENT_CHARS).collect(),
            domain: site.domain.clone(),
            source_name: site.name.clone(),
            publisher_meta: site.metadata.clone(),
            extracted_metadata: std::collections::HashMap::new(),
            structured_metadata: outcome.structured_metadata.clone(),
            language: outcome.language.clone(),
            authors: outcome.authors.clone(),
            section: outcome.section.clone(),
            tags: outcome.tags.clone(),
            publication_date: outcome.publication_date.clone(),
            confidence: if outcome.needs_review { 0.35 } else { 0.75 },
            paywall_flag,
            needs_review: outcome.needs_review,
            review_reasons: outcome.review_reasons.clone(),
            extraction_metadata: ExtractionMetadata {
                strategy: site.crawling_strategy.clone(),
                extractor: outcome.extractor_used.clone(),
                fallbacks_attempted: outcome.fallbacks_attempted.clone(),
                word_count: outcome.word_count,
                boilerplate_ratio: outcome.boilerplate_ratio,
                needs_review: outcome.needs_review,
                review_reasons: outcome.review_reasons.clone(),
                raw_html_path: outcome.raw_html_path.clone(),
                modal_handler: None,
                paywall_detection: paywall.as_ref().map(|p| PaywallTelemetry {
                    is_paywall: p.is_paywall,
                    confidence: p.confidence,
                    reasons: p.reasons.clone(),
                }),
            },
            raw_html_ref: outcome.raw_html_path,
            timestamp: Utc::now().to_rfc3339(),
            ingestion_status: if skip_ingest { IngestionStatus::PaywallSkipped } else { IngestionStatus::Unset },
            skip_ingest,
        })
    }

    /// Fetches the landing page, discovers article links, and fetches up to
    /// `max_articles` of them in parallel under `concurrent_browsers`.
    pub async fn crawl_site(&self, site: &SiteConfig, max_articles: usize) -> Vec<ArticleRecord> {
        if site.start_url.trim().is_empty() {
            return Vec::new();
        }

        let landing_html = match self.fetcher.fetch(&site.start_url).await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(domain = %site.domain, ?err, "failed to fetch landing page");
                return Vec::new();
            }
        };

        let landing_html = if let Some(handler) = &self.modal_handler {
            handler.handle(&landing_html, "landing").await.cleaned_html
        } else {
            landing_html
        };

        let mut links = discover_article_links(&landing_html, &site.start_url, &site.domain);
        if links.is_empty() {
            links.push(site.start_url.clone());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrent_browsers));
        let mut tasks = Vec::new();

        for link in links {
            let permit_semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let modal_handler = self.modal_handler.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit_semaphore.acquire_owned().await.ok()?;
                let html = fetcher.fetch(&link).await.ok()?;
                let html = match &modal_handler {
                    Some(handler) => handler.handle(&html, "article").await.cleaned_html,
                    None => html,
                };
                Some((link, html))
            }));
        }

        let mut articles = Vec::new();
        for task in tasks {
            let Ok(Some((link, html))) = task.await else { continue };
            if let Some(article) = self.build_article(&link, &html, site).await {
                articles.push(article);
            }
            if articles.len() >= max_articles {
                break;
            }
        }

        articles.truncate(max_articles);
        articles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_section_prefix_with_long_slug() {
        assert!(looks_like_article_path("/world/a-long-enough-slug"));
    }

    #[test]
    fn accepts_year_token_paths() {
        assert!(looks_like_article_path("/2024/03/01/some-story"));
    }

    #[test]
    fn rejects_short_unrelated_paths() {
        assert!(!looks_like_article_path("/about"));
    }

    #[test]
    fn discover_links_dedupes_and_stays_on_domain() {
        let html = r#"
            <html><body>
            <a href="/world/a-long-enough-slug">A</a>
            <a href="/world/a-long-enough-slug">A again</a>
            <a href="https://other.example.com/world/another-long-slug">B</a>
            <a href="/about">C</a>
            </body></html>
        "#;
        let links = discover_article_links(html, "https://news.example.com/", "news.example.com");
        assert_eq!(links, vec!["https://news.example.com/world/a-long-enough-slug".to_string()]);
    }
}
