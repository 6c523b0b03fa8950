//! HITL Forwarder (C9): fire-and-forget submission of ingestion candidates to the
//! human-in-the-loop review service, with failure-streak backoff.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;

use crate::core::config::{hitl_enabled, hitl_failure_backoff, hitl_service_url, hitl_stats_interval};
use crate::core::types::ArticleRecord;

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

pub struct HitlClient {
    client: reqwest::Client,
    base_url: String,
    failure_streak: AtomicU32,
    suspended_until_epoch: AtomicU64,
    last_stats_probe_epoch: AtomicU64,
}

impl HitlClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(6))
            .build()
            .expect("reqwest client builds with static config");
        HitlClient {
            client,
            base_url: hitl_service_url(),
            failure_streak: AtomicU32::new(0),
            suspended_until_epoch: AtomicU64::new(0),
            last_stats_probe_epoch: AtomicU64::new(0),
        }
    }

    fn is_suspended(&self) -> bool {
        now_secs() < self.suspended_until_epoch.load(Ordering::Relaxed)
    }

    fn build_payload(article: &ArticleRecord, job_id: Option<&str>) -> serde_json::Value {
        let mut payload = json!({
            "url": article.url,
            "extracted_title": article.title,
            "extracted_text": article.content,
            "raw_html_ref": article.raw_html_ref,
            "crawler_ts": article.timestamp,
        });
        if let Some(job_id) = job_id {
            payload["crawler_job_id"] = json!(job_id);
        }
        payload
    }

    /// Submits `article` unless submissions are currently suspended by backoff.
    /// Never blocks the caller on failure — errors are logged and absorbed here.
    pub async fn submit(&self, article: &ArticleRecord, job_id: Option<&str>) {
        if !hitl_enabled() || self.is_suspended() {
            return;
        }

        let payload = Self::build_payload(article, job_id);
        let url = format!("{}/api/candidates", self.base_url);

        match self.client.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                self.failure_streak.store(0, Ordering::Relaxed);
                self.maybe_probe_stats().await;
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "hitl submission rejected");
                self.record_failure();
            }
            Err(err) => {
                tracing::warn!(?err, "hitl submission failed");
                self.record_failure();
            }
        }
    }

    fn record_failure(&self) {
        let streak = self.failure_streak.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= 3 {
            let backoff = hitl_failure_backoff();
            self.suspended_until_epoch.store(now_secs() + backoff.as_secs(), Ordering::Relaxed);
            tracing::warn!(streak, backoff = ?backoff, "hitl suspended after repeated failures");
        }
    }

    async fn maybe_probe_stats(&self) {
        let interval = hitl_stats_interval().as_secs();
        let last = self.last_stats_probe_epoch.load(Ordering::Relaxed);
        let now = now_secs();
        if now.saturating_sub(last) < interval {
            return;
        }
        self.last_stats_probe_epoch.store(now, Ordering::Relaxed);

        let url = format!("{}/api/stats", self.base_url);
        if let Ok(resp) = self.client.get(&url).send().await {
            if let Ok(stats) = resp.json::<serde_json::Value>().await {
                tracing::info!(?stats, "hitl queue stats");
            }
        }
    }
}

impl Default for HitlClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspends_after_three_consecutive_failures() {
        let client = HitlClient::new();
        assert!(!client.is_suspended());
        client.record_failure();
        client.record_failure();
        assert!(!client.is_suspended());
        client.record_failure();
        assert!(client.is_suspended());
    }
}
