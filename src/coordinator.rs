//! Multi-Site Coordinator (C8): fans out per-site loops under a semaphore, reserves
//! budget through a single shared [`BudgetArbiter`], and aggregates results into one
//! [`RunSummary`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex, Semaphore};

use crate::budget::BudgetArbiter;
use crate::core::types::{AdaptiveSummary, ArticleRecord, RunSummary, SiteConfig, Strategy, StrategyUsage};
use crate::crawler::SiteCrawler;
use crate::hitl::HitlClient;
use crate::ingest::IngestionClient;
use crate::per_site::run_per_site;
use crate::sources::SourceDirectory;
use crate::strategy::StrategySelector;

pub struct CoordinatorDeps {
    pub crawler: Arc<SiteCrawler>,
    pub strategy_selector: Arc<StrategySelector>,
    pub hitl: Arc<HitlClient>,
    pub ingestion: Arc<dyn IngestionClient>,
    pub sources: Arc<dyn SourceDirectory>,
}

fn bump_strategy_usage(usage: &mut StrategyUsage, strategy: &Strategy) {
    match strategy {
        Strategy::UltraFast => usage.ultra_fast += 1,
        Strategy::AiEnhanced => usage.ai_enhanced += 1,
        Strategy::Generic => usage.generic += 1,
        Strategy::Profiled(_) => usage.profiled += 1,
    }
}

fn resolve_strategy(site: &SiteConfig, profile_overrides: &HashMap<String, Strategy>) -> Option<Strategy> {
    profile_overrides.get(&site.domain.to_ascii_lowercase()).or_else(|| profile_overrides.get(&site.name.to_ascii_lowercase())).cloned()
}

fn summarise_adaptive(articles: &[ArticleRecord]) -> Option<AdaptiveSummary> {
    if articles.is_empty() {
        return None;
    }

    let mut histogram: HashMap<String, usize> = HashMap::new();
    let mut needs_review_count = 0;
    let mut confidence_sum = 0.0;

    for article in articles {
        *histogram.entry(article.extraction_metadata.strategy.clone()).or_insert(0) += 1;
        if article.needs_review {
            needs_review_count += 1;
        }
        confidence_sum += article.confidence;
    }

    Some(AdaptiveSummary {
        articles_considered: articles.len(),
        needs_review_count,
        mean_confidence: confidence_sum / articles.len() as f64,
        strategy_histogram: histogram,
    })
}

fn filtered(counts: HashMap<String, usize>) -> HashMap<String, usize> {
    counts.into_iter().filter(|(_, v)| *v > 0).collect()
}

/// Runs `domains` concurrently (bounded by `concurrency`) against `per_site_cap`
/// articles each, optionally capped by `global_target` total ingested articles.
///
/// `shutdown` is a watch channel shared across every per-site task: the caller
/// flips it to `true` to request cancellation. Each task notices at its next batch
/// boundary, restores any reservation it still holds, reports itself as errored,
/// and returns — the tasks spawned here are always awaited to completion, so a
/// cancelled run still yields a full (if partial) [`RunSummary`] rather than being
/// abandoned mid-flight.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    domains: Vec<String>,
    per_site_cap: usize,
    concurrency: usize,
    global_target: Option<usize>,
    profile_overrides: HashMap<String, Strategy>,
    deps: CoordinatorDeps,
    job_id: Option<String>,
    shutdown: watch::Receiver<bool>,
) -> RunSummary {
    let started_at = Instant::now();
    let budget = Arc::new(BudgetArbiter::new(global_target));
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let sites = deps.sources.get_sources_by_domain(&domains).await;
    if sites.len() < domains.len() {
        tracing::warn!(requested = domains.len(), resolved = sites.len(), "some domains could not be resolved to a site config");
    }

    let aggregate = Arc::new(Mutex::new(RunSummary::default()));
    let mut tasks = Vec::new();

    for site in sites {
        let strategy = match resolve_strategy(&site, &profile_overrides) {
            Some(s) => s,
            None => deps.strategy_selector.select(&site.domain, site.source_id, deps.sources.as_ref()).await,
        };

        let semaphore = Arc::clone(&semaphore);
        let crawler = Arc::clone(&deps.crawler);
        let budget = Arc::clone(&budget);
        let hitl = Arc::clone(&deps.hitl);
        let ingestion = Arc::clone(&deps.ingestion);
        let sources = Arc::clone(&deps.sources);
        let aggregate = Arc::clone(&aggregate);
        let job_id = job_id.clone();
        let strategy_for_task = strategy.clone();
        let shutdown = shutdown.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = run_per_site(site, strategy_for_task.clone(), per_site_cap, crawler, budget, hitl, ingestion, sources, job_id, shutdown).await;

            let mut aggregate = aggregate.lock().await;
            aggregate.sites_crawled += 1;
            aggregate.total_articles_attempted += result.metrics.attempted;
            aggregate.total_ingest_candidates += result.metrics.candidates;
            aggregate.total_articles += result.metrics.ingested;
            aggregate.duplicates_skipped += result.metrics.duplicates;
            aggregate.ingestion_errors += result.metrics.errors;
            aggregate.total_paywalls_detected += result.metrics.paywalls;
            bump_strategy_usage(&mut aggregate.strategy_breakdown, &strategy_for_task);

            aggregate.site_breakdown.insert(result.domain.clone(), result.metrics.ingested);
            aggregate.site_attempted_breakdown.insert(result.domain.clone(), result.metrics.attempted);
            aggregate.site_candidate_breakdown.insert(result.domain.clone(), result.metrics.candidates);
            aggregate.site_duplicate_breakdown.insert(result.domain.clone(), result.metrics.duplicates);
            aggregate.site_error_breakdown.insert(result.domain.clone(), result.metrics.errors);
            aggregate.site_paywall_breakdown.insert(result.domain.clone(), result.metrics.paywalls);
            if let Some(reason) = &result.metrics.exhaustion_reason {
                aggregate.site_exhaustion.insert(result.domain.clone(), reason.clone());
            }
            aggregate.site_ingestion_details.insert(result.domain.clone(), result.metrics.details.clone());
            aggregate.articles.extend(result.articles);
        }));
    }

    for task in tasks {
        if let Err(join_err) = task.await {
            tracing::error!(?join_err, "per-site task panicked");
        }
    }

    let mut summary = Arc::try_unwrap(aggregate).expect("all tasks have completed").into_inner();

    summary.site_breakdown = filtered(summary.site_breakdown);
    summary.site_attempted_breakdown = filtered(summary.site_attempted_breakdown);
    summary.site_candidate_breakdown = filtered(summary.site_candidate_breakdown);
    summary.site_duplicate_breakdown = filtered(summary.site_duplicate_breakdown);
    summary.site_error_breakdown = filtered(summary.site_error_breakdown);
    summary.site_paywall_breakdown = filtered(summary.site_paywall_breakdown);

    let elapsed = started_at.elapsed().as_secs_f64().max(f64::EPSILON);
    summary.processing_time_seconds = elapsed;
    summary.articles_per_second = summary.total_articles as f64 / elapsed;
    summary.global_target_total = global_target;
    summary.global_target_reached = global_target.map(|t| summary.total_articles >= t).unwrap_or(false);
    summary.adaptive_summary = summarise_adaptive(&summary.articles);

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_summary_is_none_for_empty_run() {
        assert!(summarise_adaptive(&[]).is_none());
    }

    #[test]
    fn filtered_drops_zero_entries() {
        let mut counts = HashMap::new();
        counts.insert("a.com".to_string(), 0usize);
        counts.insert("b.com".to_string(), 3usize);
        let result = filtered(counts);
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("b.com"), Some(&3));
    }
}
