use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identity of a publisher target. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub source_id: Option<i64>,
    pub name: String,
    pub domain: String,
    pub start_url: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub crawling_strategy: String,
}

impl SiteConfig {
    /// Builds a config from whatever the caller has on hand: a bare domain or a full URL.
    /// Mirrors the fallback the coordinator takes when no upstream source record exists.
    pub fn synthesize(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let (domain, start_url) = if let Ok(parsed) = url::Url::parse(input) {
            if let Some(host) = parsed.host_str() {
                (host.to_string(), input.to_string())
            } else {
                return None;
            }
        } else {
            (input.to_string(), format!("https://{input}"))
        };

        Some(SiteConfig {
            source_id: None,
            name: domain.clone(),
            domain,
            start_url,
            metadata: HashMap::new(),
            crawling_strategy: "generic".to_string(),
        })
    }

    pub fn domain_key(&self) -> &str {
        if self.domain.is_empty() {
            &self.name
        } else {
            &self.domain
        }
    }
}

/// A candidate or ingested article, produced by the Site Crawler and mutated by the
/// HITL forwarder / ingestion client with post-ingestion status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub canonical: String,
    pub normalized_url: String,
    pub url_hash: String,

    pub title: String,
    pub content: String,
    pub domain: String,
    pub source_name: String,
    #[serde(default)]
    pub publisher_meta: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub extracted_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub structured_metadata: HashMap<String, serde_json::Value>,
    pub language: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub section: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub publication_date: Option<String>,

    pub confidence: f64,
    pub paywall_flag: bool,
    pub needs_review: bool,
    #[serde(default)]
    pub review_reasons: Vec<String>,

    pub extraction_metadata: ExtractionMetadata,

    pub raw_html_ref: Option<String>,
    pub timestamp: String,

    pub ingestion_status: IngestionStatus,
    /// Set by the paywall filter; excludes the article from ingestion without dropping it.
    #[serde(default)]
    pub skip_ingest: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub strategy: String,
    pub extractor: String,
    #[serde(default)]
    pub fallbacks_attempted: Vec<String>,
    pub word_count: usize,
    pub boilerplate_ratio: f64,
    pub needs_review: bool,
    #[serde(default)]
    pub review_reasons: Vec<String>,
    pub raw_html_path: Option<String>,
    pub modal_handler: Option<ModalHandlerTelemetry>,
    pub paywall_detection: Option<PaywallTelemetry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalHandlerTelemetry {
    pub modals_detected: bool,
    pub consent_cookies: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaywallTelemetry {
    pub is_paywall: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Unset,
    New,
    Duplicate,
    Error,
    PaywallSkipped,
}

impl Default for IngestionStatus {
    fn default() -> Self {
        IngestionStatus::Unset
    }
}

/// One per domain per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub attempted: usize,
    pub candidates: usize,
    pub ingested: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub paywalls: usize,
    pub exhaustion_reason: Option<String>,
    pub details: Vec<IngestionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionDetail {
    pub url: String,
    pub status: String,
    pub error: Option<String>,
}

/// Returned by the coordinator for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub sites_crawled: usize,
    pub total_articles_attempted: usize,
    pub total_ingest_candidates: usize,
    pub total_articles: usize,
    pub duplicates_skipped: usize,
    pub ingestion_errors: usize,
    pub total_paywalls_detected: usize,
    pub processing_time_seconds: f64,
    pub articles_per_second: f64,

    pub strategy_breakdown: StrategyUsage,
    pub site_breakdown: HashMap<String, usize>,
    pub site_attempted_breakdown: HashMap<String, usize>,
    pub site_candidate_breakdown: HashMap<String, usize>,
    pub site_duplicate_breakdown: HashMap<String, usize>,
    pub site_error_breakdown: HashMap<String, usize>,
    pub site_paywall_breakdown: HashMap<String, usize>,
    pub site_exhaustion: HashMap<String, String>,
    pub site_ingestion_details: HashMap<String, Vec<IngestionDetail>>,

    pub articles: Vec<ArticleRecord>,

    pub global_target_total: Option<usize>,
    pub global_target_reached: bool,

    pub adaptive_summary: Option<AdaptiveSummary>,
}

/// Run-level reduction of per-article extraction telemetry, present only when at
/// least one article was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptiveSummary {
    pub articles_considered: usize,
    pub needs_review_count: usize,
    pub mean_confidence: f64,
    pub strategy_histogram: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyUsage {
    pub ultra_fast: usize,
    pub ai_enhanced: usize,
    pub generic: usize,
    pub profiled: usize,
}

/// Pure value returned by the Extractor (C2). No IO, no mutable state.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub text: String,
    pub title: Option<String>,
    pub canonical_url: Option<String>,
    pub publication_date: Option<String>,
    pub authors: Vec<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub extractor_used: String,
    pub fallbacks_attempted: Vec<String>,
    pub word_count: usize,
    pub boilerplate_ratio: f64,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub structured_metadata: HashMap<String, serde_json::Value>,
    pub raw_html_path: Option<String>,
}

/// Tagged-union strategy selection (C5). A payload-carrying variant for the profiled
/// engine path rather than a trait hierarchy — see DESIGN.md's Polymorphism note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    UltraFast,
    AiEnhanced,
    Generic,
    Profiled(ProfileOverride),
}

impl Strategy {
    pub fn as_label(&self) -> &'static str {
        match self {
            Strategy::UltraFast => "ultra_fast",
            Strategy::AiEnhanced => "ai_enhanced",
            Strategy::Generic => "generic",
            Strategy::Profiled(_) => "profiled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverride {
    pub engine: String,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

/// One strategy performance sample, as read from `get_source_performance_history`.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceRecord {
    pub strategy_used: String,
    pub articles_per_second: f64,
}
