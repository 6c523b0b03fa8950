//! Per-Site Loop (C6): runs inside a coordinator-held semaphore slot, pulling
//! batches from the Site Crawler, reserving global budget atomically, forwarding to
//! HITL, ingesting, and classifying why the site eventually stopped.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::budget::BudgetArbiter;
use crate::core::config::max_site_batches;
use crate::core::types::{ArticleRecord, IngestionDetail, SiteConfig, SiteMetrics, Strategy};
use crate::crawler::SiteCrawler;
use crate::hitl::HitlClient;
use crate::ingest::{IngestOutcome, IngestionClient};
use crate::sources::SourceDirectory;

pub struct PerSiteResult {
    pub domain: String,
    pub metrics: SiteMetrics,
    pub articles: Vec<ArticleRecord>,
}

fn dedup_key(article: &ArticleRecord) -> String {
    article.url_hash.clone()
}

async fn ingest_batch(
    batch: Vec<ArticleRecord>,
    hitl: &HitlClient,
    ingestion: &dyn IngestionClient,
    job_id: Option<&str>,
    metrics: &mut SiteMetrics,
    articles_local: &mut Vec<ArticleRecord>,
) -> usize {
    let mut ingested = 0;

    for mut article in batch {
        hitl.submit(&article, job_id).await;

        let outcome = ingestion.ingest(&article).await;
        article.ingestion_status = outcome.as_ingestion_status();

        match &outcome {
            IngestOutcome::New => {
                metrics.ingested += 1;
                ingested += 1;
                metrics.details.push(IngestionDetail { url: article.url.clone(), status: "new".to_string(), error: None });
            }
            IngestOutcome::Duplicate => {
                metrics.duplicates += 1;
                metrics.details.push(IngestionDetail { url: article.url.clone(), status: "duplicate".to_string(), error: None });
            }
            IngestOutcome::Error(err) => {
                metrics.errors += 1;
                metrics
                    .details
                    .push(IngestionDetail { url: article.url.clone(), status: "error".to_string(), error: Some(err.clone()) });
            }
        }

        articles_local.push(article);
    }

    ingested
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Runs one site to completion (profiled one-shot or batched looping, depending on
/// `strategy`), returning its metrics and whatever articles it ingested.
///
/// `shutdown` is checked at each batch boundary; once it flips to `true` the loop
/// stops pulling further batches, never leaving a reservation outstanding (every
/// batch's `reserve` is always paired with a `restore` before the next checkpoint),
/// and reports the site as errored rather than cleanly exhausted.
#[allow(clippy::too_many_arguments)]
pub async fn run_per_site(
    site: SiteConfig,
    strategy: Strategy,
    per_site_cap: usize,
    crawler: Arc<SiteCrawler>,
    budget: Arc<BudgetArbiter>,
    hitl: Arc<HitlClient>,
    ingestion: Arc<dyn IngestionClient>,
    sources: Arc<dyn SourceDirectory>,
    job_id: Option<String>,
    shutdown: watch::Receiver<bool>,
) -> PerSiteResult {
    let domain = site.domain.clone();
    let mut metrics = SiteMetrics::default();
    let mut articles_local = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    let outcome = run_loop(
        &site,
        &strategy,
        per_site_cap,
        &crawler,
        &budget,
        &hitl,
        ingestion.as_ref(),
        job_id.as_deref(),
        &mut metrics,
        &mut articles_local,
        &mut seen_keys,
        &shutdown,
    )
    .await;

    if let Err(err) = outcome {
        tracing::warn!(domain = %domain, %err, "per-site loop failed");
        metrics.errors += 1;
        if metrics.exhaustion_reason.is_none() {
            metrics.exhaustion_reason = Some("error".to_string());
        }
    }

    if metrics.paywalls > 0 && metrics.ingested == 0 {
        sources.record_paywall_detection(site.source_id, &domain, metrics.paywalls, crate::core::config::paywall_skip_activation_threshold()).await;
    }

    PerSiteResult {
        domain,
        metrics,
        articles: articles_local,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    site: &SiteConfig,
    strategy: &Strategy,
    per_site_cap: usize,
    crawler: &SiteCrawler,
    budget: &BudgetArbiter,
    hitl: &HitlClient,
    ingestion: &dyn IngestionClient,
    job_id: Option<&str>,
    metrics: &mut SiteMetrics,
    articles_local: &mut Vec<ArticleRecord>,
    seen_keys: &mut HashSet<String>,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), String> {
    if matches!(strategy, Strategy::Profiled(_)) {
        return run_profiled(site, per_site_cap, crawler, budget, hitl, ingestion, job_id, metrics, articles_local, seen_keys, shutdown).await;
    }
    run_batched(site, per_site_cap, crawler, budget, hitl, ingestion, job_id, metrics, articles_local, seen_keys, shutdown).await
}

#[allow(clippy::too_many_arguments)]
async fn run_profiled(
    site: &SiteConfig,
    per_site_cap: usize,
    crawler: &SiteCrawler,
    budget: &BudgetArbiter,
    hitl: &HitlClient,
    ingestion: &dyn IngestionClient,
    job_id: Option<&str>,
    metrics: &mut SiteMetrics,
    articles_local: &mut Vec<ArticleRecord>,
    seen_keys: &mut HashSet<String>,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), String> {
    if is_cancelled(shutdown) {
        return Err("shutdown requested before profiled batch started".to_string());
    }

    let batch = crawler.crawl_site(site, per_site_cap).await;
    metrics.attempted += batch.len();

    let mut fresh = Vec::new();
    for article in batch {
        let key = dedup_key(&article);
        if seen_keys.insert(key) {
            fresh.push(article);
        }
    }

    if is_cancelled(shutdown) {
        return Err("shutdown requested during profiled batch".to_string());
    }

    let reservation = budget.reserve(fresh.len()).await;
    let (reserved_batch, overflow) = {
        let mut reserved = fresh;
        let overflow = reserved.split_off(reservation.min(reserved.len()));
        (reserved, overflow)
    };
    drop(overflow);

    let mut paywalled = Vec::new();
    let mut remainder = Vec::new();
    for article in reserved_batch {
        if article.skip_ingest {
            metrics.paywalls += 1;
            paywalled.push(article);
        } else {
            metrics.candidates += 1;
            remainder.push(article);
        }
    }

    let ingested = ingest_batch(remainder, hitl, ingestion, job_id, metrics, articles_local).await;

    let shortfall = reservation.saturating_sub(ingested);
    budget.restore(shortfall).await;

    metrics.exhaustion_reason = Some(if ingested == 0 && !paywalled.is_empty() {
        "paywalls_only".to_string()
    } else {
        "profile_completed".to_string()
    });

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_batched(
    site: &SiteConfig,
    per_site_cap: usize,
    crawler: &SiteCrawler,
    budget: &BudgetArbiter,
    hitl: &HitlClient,
    ingestion: &dyn IngestionClient,
    job_id: Option<&str>,
    metrics: &mut SiteMetrics,
    articles_local: &mut Vec<ArticleRecord>,
    seen_keys: &mut HashSet<String>,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), String> {
    let mut remaining_budget = per_site_cap;
    let mut batches_run = 0usize;
    let max_batches = max_site_batches();

    loop {
        if is_cancelled(shutdown) {
            return Err("shutdown requested between batches".to_string());
        }
        if remaining_budget == 0 {
            metrics.exhaustion_reason = Some("limit_reached".to_string());
            break;
        }
        if batches_run >= max_batches {
            metrics.exhaustion_reason = Some("max_batches_reached".to_string());
            break;
        }
        if budget.is_exhausted().await {
            metrics.exhaustion_reason = Some("global_target_reached".to_string());
            break;
        }

        let snapshot = budget.snapshot().await;
        let request_cap = match snapshot.remaining {
            Some(global_remaining) => remaining_budget.min(global_remaining).max(1),
            None => remaining_budget,
        };

        let batch = crawler.crawl_site(site, request_cap).await;
        batches_run += 1;
        metrics.attempted += batch.len();

        if batch.is_empty() {
            metrics.exhaustion_reason = Some("no_candidates".to_string());
            break;
        }

        let mut fresh = Vec::new();
        for article in batch {
            let key = dedup_key(&article);
            if seen_keys.insert(key) {
                fresh.push(article);
            }
        }

        let mut paywalled = Vec::new();
        let mut remainder = Vec::new();
        for article in fresh {
            if article.skip_ingest {
                metrics.paywalls += 1;
                paywalled.push(article);
            } else {
                remainder.push(article);
            }
        }

        if remainder.is_empty() {
            if !paywalled.is_empty() {
                metrics.exhaustion_reason = Some("paywalls_only".to_string());
                break;
            }
            metrics.exhaustion_reason = Some("no_new_candidates".to_string());
            break;
        }

        if is_cancelled(shutdown) {
            return Err("shutdown requested before reserving budget".to_string());
        }

        remainder.truncate(remaining_budget);
        metrics.candidates += remainder.len();

        let requested = remainder.len();
        let reservation = budget.reserve(requested).await;
        if reservation == 0 {
            continue;
        }
        remainder.truncate(reservation);

        let ingested = ingest_batch(remainder, hitl, ingestion, job_id, metrics, articles_local).await;

        let shortfall = reservation.saturating_sub(ingested);
        budget.restore(shortfall).await;

        remaining_budget = remaining_budget.saturating_sub(ingested);

        if ingested == 0 {
            metrics.exhaustion_reason = Some("ingestion_stalled".to_string());
            break;
        }

        if budget.is_exhausted().await {
            metrics.exhaustion_reason = Some("global_target_reached".to_string());
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExtractionMetadata, IngestionStatus};
    use async_trait::async_trait;

    fn fake_article(domain: &str, seq: usize) -> ArticleRecord {
        ArticleRecord {
            url: format!("https://{domain}/a{seq}"),
            canonical: format!("https://{domain}/a{seq}"),
            normalized_url: format!("https://{domain}/a{seq}"),
            url_hash: format!("hash{seq}"),
            title: "Title".to_string(),
            content: "word ".repeat(200),
            domain: domain.to_string(),
            source_name: domain.to_string(),
            publisher_meta: Default::default(),
            extracted_metadata: Default::default(),
            structured_metadata: Default::default(),
            language: Some("en".to_string()),
            authors: vec![],
            section: None,
            tags: vec![],
            publication_date: None,
            confidence: 0.75,
            paywall_flag: false,
            needs_review: false,
            review_reasons: vec![],
            extraction_metadata: ExtractionMetadata::default(),
            raw_html_ref: None,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            ingestion_status: IngestionStatus::Unset,
            skip_ingest: false,
        }
    }

    struct FakeIngestion;

    #[async_trait]
    impl IngestionClient for FakeIngestion {
        async fn ingest(&self, _article: &ArticleRecord) -> IngestOutcome {
            IngestOutcome::New
        }
    }

    #[tokio::test]
    async fn ingest_batch_updates_metrics_for_new_articles() {
        std::env::set_var("ENABLE_HITL_PIPELINE", "false");
        let hitl = HitlClient::new();
        let mut metrics = SiteMetrics::default();
        let mut articles_local = Vec::new();
        let batch = vec![fake_article("example.com", 1), fake_article("example.com", 2)];
        let ingested = ingest_batch(batch, &hitl, &FakeIngestion, None, &mut metrics, &mut articles_local).await;
        assert_eq!(ingested, 2);
        assert_eq!(metrics.ingested, 2);
        assert_eq!(articles_local.len(), 2);
        std::env::remove_var("ENABLE_HITL_PIPELINE");
    }
}
