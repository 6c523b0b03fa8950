//! Strategy Selector (C5): picks an engine strategy per site, preferring measured
//! performance history over static domain allow-lists.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::core::types::{PerformanceRecord, Strategy};
use crate::sources::SourceDirectory;

const HISTORY_LIMIT: usize = 5;
const MEAN_ARTICLES_PER_SEC_THRESHOLD: f64 = 0.1;

pub struct StrategySelector {
    fast_tier_domains: Vec<String>,
    complex_tier_domains: Vec<String>,
    cache: RwLock<HashMap<(String, Option<i64>), Strategy>>,
}

impl StrategySelector {
    pub fn new(fast_tier_domains: Vec<String>, complex_tier_domains: Vec<String>) -> Self {
        StrategySelector {
            fast_tier_domains,
            complex_tier_domains,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(domain: &str, source_id: Option<i64>) -> (String, Option<i64>) {
        (domain.to_ascii_lowercase(), source_id)
    }

    fn best_by_history(records: &[PerformanceRecord]) -> Option<Strategy> {
        let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
        for record in records {
            let entry = totals.entry(record.strategy_used.clone()).or_insert((0.0, 0));
            entry.0 += record.articles_per_second;
            entry.1 += 1;
        }

        totals
            .into_iter()
            .map(|(strategy, (sum, count))| (strategy, sum / count as f64))
            .filter(|(_, mean)| *mean > MEAN_ARTICLES_PER_SEC_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(strategy, _)| match strategy.as_str() {
                "ultra_fast" => Strategy::UltraFast,
                "ai_enhanced" => Strategy::AiEnhanced,
                _ => Strategy::Generic,
            })
    }

    fn by_domain_allowlist(&self, domain: &str) -> Strategy {
        let lower = domain.to_ascii_lowercase();
        if self.fast_tier_domains.iter().any(|d| lower.contains(d.as_str())) {
            Strategy::UltraFast
        } else if self.complex_tier_domains.iter().any(|d| lower.contains(d.as_str())) {
            Strategy::AiEnhanced
        } else {
            Strategy::Generic
        }
    }

    /// Selects a strategy for `domain`/`source_id`, consulting the cache, then
    /// performance history, then domain allow-lists, defaulting to `generic`.
    pub async fn select(&self, domain: &str, source_id: Option<i64>, sources: &dyn SourceDirectory) -> Strategy {
        let key = Self::cache_key(domain, source_id);

        if let Some(cached) = self.cache.read().await.get(&key) {
            return cached.clone();
        }

        let strategy = if let Some(source_id) = source_id {
            let history = sources.get_source_performance_history(source_id, HISTORY_LIMIT).await;
            Self::best_by_history(&history).unwrap_or_else(|| self.by_domain_allowlist(domain))
        } else {
            self.by_domain_allowlist(domain)
        };

        self.cache.write().await.insert(key, strategy.clone());
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::core::types::SiteConfig;

    struct FakeSources(Vec<PerformanceRecord>);

    #[async_trait]
    impl SourceDirectory for FakeSources {
        async fn get_sources_by_domain(&self, _domains: &[String]) -> Vec<SiteConfig> {
            Vec::new()
        }
        async fn get_source_performance_history(&self, _source_id: i64, _limit: usize) -> Vec<PerformanceRecord> {
            self.0.clone()
        }
        async fn record_paywall_detection(&self, _source_id: Option<i64>, _domain: &str, _skip_count: usize, _threshold: usize) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn picks_highest_mean_strategy_from_history() {
        let selector = StrategySelector::new(vec![], vec![]);
        let sources = FakeSources(vec![
            PerformanceRecord { strategy_used: "ultra_fast".to_string(), articles_per_second: 0.5 },
            PerformanceRecord { strategy_used: "generic".to_string(), articles_per_second: 0.2 },
        ]);
        let strategy = selector.select("example.com", Some(1), &sources).await;
        assert!(matches!(strategy, Strategy::UltraFast));
    }

    #[tokio::test]
    async fn falls_back_to_domain_allowlist_without_source_id() {
        let selector = StrategySelector::new(vec!["fastnews".to_string()], vec![]);
        let sources = FakeSources(vec![]);
        let strategy = selector.select("fastnews.example.com", None, &sources).await;
        assert!(matches!(strategy, Strategy::UltraFast));
    }

    #[tokio::test]
    async fn defaults_to_generic() {
        let selector = StrategySelector::new(vec![], vec![]);
        let sources = FakeSources(vec![]);
        let strategy = selector.select("unknown.example.com", Some(2), &sources).await;
        assert!(matches!(strategy, Strategy::Generic));
    }

    #[tokio::test]
    async fn caches_result_for_repeat_lookups() {
        let selector = StrategySelector::new(vec!["fastnews".to_string()], vec![]);
        let sources = FakeSources(vec![]);
        let first = selector.select("fastnews.example.com", None, &sources).await;
        let second = selector.select("fastnews.example.com", None, &sources).await;
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }
}
