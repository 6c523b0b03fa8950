//! Read-only configuration and sources interface. A real deployment backs this with
//! whatever database the surrounding system uses; [`InMemorySourceDirectory`] exists
//! so the crawler is usable standalone.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::types::{PerformanceRecord, SiteConfig};

#[async_trait]
pub trait SourceDirectory: Send + Sync {
    async fn get_sources_by_domain(&self, domains: &[String]) -> Vec<SiteConfig>;
    async fn get_source_performance_history(&self, source_id: i64, limit: usize) -> Vec<PerformanceRecord>;
    async fn record_paywall_detection(&self, source_id: Option<i64>, domain: &str, skip_count: usize, threshold: usize) -> bool;
}

/// Synthesizes a minimal [`SiteConfig`] from a bare domain/URL when there is no
/// upstream database entry, matching the "no database entry, creating basic config"
/// behavior the rest of the pipeline expects.
#[derive(Default)]
pub struct InMemorySourceDirectory {
    known: HashMap<String, SiteConfig>,
    paywall_state: Mutex<HashMap<String, usize>>,
}

impl InMemorySourceDirectory {
    pub fn new(known: Vec<SiteConfig>) -> Self {
        let known = known.into_iter().map(|c| (c.domain.clone(), c)).collect();
        InMemorySourceDirectory {
            known,
            paywall_state: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SourceDirectory for InMemorySourceDirectory {
    async fn get_sources_by_domain(&self, domains: &[String]) -> Vec<SiteConfig> {
        domains
            .iter()
            .filter_map(|domain| {
                self.known.get(domain).cloned().or_else(|| {
                    let synthesized = SiteConfig::synthesize(domain);
                    if synthesized.is_none() {
                        tracing::warn!(domain, "no database entry, creating basic config failed: invalid domain");
                    } else {
                        tracing::info!(domain, "no database entry for domain, creating basic config");
                    }
                    synthesized
                })
            })
            .collect()
    }

    async fn get_source_performance_history(&self, _source_id: i64, _limit: usize) -> Vec<PerformanceRecord> {
        Vec::new()
    }

    async fn record_paywall_detection(&self, _source_id: Option<i64>, domain: &str, skip_count: usize, threshold: usize) -> bool {
        let mut state = self.paywall_state.lock().await;
        let was_below = state.get(domain).copied().unwrap_or(0) < threshold;
        state.insert(domain.to_string(), skip_count);
        let now_at_or_above = skip_count >= threshold;
        was_below && now_at_or_above
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthesizes_config_for_unknown_domain() {
        let directory = InMemorySourceDirectory::default();
        let configs = directory.get_sources_by_domain(&["example.com".to_string()]).await;
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].domain, "example.com");
    }

    #[tokio::test]
    async fn paywall_detection_reports_status_change_once() {
        let directory = InMemorySourceDirectory::default();
        assert!(!directory.record_paywall_detection(None, "example.com", 1, 3).await);
        assert!(!directory.record_paywall_detection(None, "example.com", 2, 3).await);
        assert!(directory.record_paywall_detection(None, "example.com", 3, 3).await);
        assert!(!directory.record_paywall_detection(None, "example.com", 4, 3).await);
    }
}
