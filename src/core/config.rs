//! Typed environment-variable accessors for every tunable the crawler recognizes.
//! Each function documents its own default and falls back to that default on a
//! missing or unparseable value rather than failing the run — matching the existing
//! `neurosiphon_enabled()`/`lancedb_uri()` convention.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn parse_int_env(key: &str, default: usize, minimum: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|v| v.max(minimum))
        .unwrap_or(default)
}

fn parse_float_env(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => {
            let v = v.trim().to_ascii_lowercase();
            if v.is_empty() {
                default
            } else {
                !matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled")
            }
        }
        Err(_) => default,
    }
}

/// `UNIFIED_CRAWLER_MAX_SITE_BATCHES`, default 4, floor 1.
pub fn max_site_batches() -> usize {
    parse_int_env("UNIFIED_CRAWLER_MAX_SITE_BATCHES", 4, 1)
}

/// `UNIFIED_CRAWLER_PAYWALL_SKIP_THRESHOLD`, default 3, floor 1.
pub fn paywall_skip_activation_threshold() -> usize {
    parse_int_env("UNIFIED_CRAWLER_PAYWALL_SKIP_THRESHOLD", 3, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlNormalizationMode {
    Strict,
    Lenient,
    None,
}

/// `ARTICLE_URL_NORMALIZATION` ∈ {strict, lenient, none}, default strict.
pub fn url_normalization_mode() -> UrlNormalizationMode {
    match std::env::var("ARTICLE_URL_NORMALIZATION") {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "lenient" => UrlNormalizationMode::Lenient,
            "none" => UrlNormalizationMode::None,
            _ => UrlNormalizationMode::Strict,
        },
        Err(_) => UrlNormalizationMode::Strict,
    }
}

/// `ARTICLE_URL_HASH_ALGO`, default "sha256".
pub fn url_hash_algo() -> String {
    std::env::var("ARTICLE_URL_HASH_ALGO")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "sha256".to_string())
}

/// `ARTICLE_MIN_WORDS`, default 120.
pub fn min_words() -> usize {
    parse_int_env("ARTICLE_MIN_WORDS", 120, 0)
}

/// `ARTICLE_MIN_TEXT_HTML_RATIO`, default 0.015.
pub fn min_text_html_ratio() -> f64 {
    parse_float_env("ARTICLE_MIN_TEXT_HTML_RATIO", 0.015)
}

/// `UNIFIED_CRAWLER_ENABLE_HTTP_FETCH`, default true.
pub fn enable_http_fetch() -> bool {
    parse_bool_env("UNIFIED_CRAWLER_ENABLE_HTTP_FETCH", true)
}

/// `HITL_SERVICE_URL` → `HITL_SERVICE_ADDRESS` → `http://localhost:8040`, trailing slash trimmed.
pub fn hitl_service_url() -> String {
    let raw = std::env::var("HITL_SERVICE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var("HITL_SERVICE_ADDRESS").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "http://localhost:8040".to_string());
    raw.trim_end_matches('/').to_string()
}

/// `ENABLE_HITL_PIPELINE`, default true, disabled only on exact "false".
pub fn hitl_enabled() -> bool {
    std::env::var("ENABLE_HITL_PIPELINE")
        .map(|v| v.trim() != "false")
        .unwrap_or(true)
}

/// `HITL_STATS_INTERVAL_SECONDS`, default 60, floor 0.
pub fn hitl_stats_interval() -> Duration {
    Duration::from_secs(parse_int_env("HITL_STATS_INTERVAL_SECONDS", 60, 0) as u64)
}

/// `HITL_FAILURE_BACKOFF_SECONDS`, default 180, floor 30.
pub fn hitl_failure_backoff() -> Duration {
    Duration::from_secs(parse_int_env("HITL_FAILURE_BACKOFF_SECONDS", 180, 30) as u64)
}

/// `HITL_PRIORITY_SITES` CSV, empty when unset.
pub fn hitl_priority_sites() -> Vec<String> {
    std::env::var("HITL_PRIORITY_SITES")
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `MCP_BUS_URL`, the storage-tool RPC endpoint, default `http://localhost:8000`.
pub fn mcp_bus_url() -> String {
    std::env::var("MCP_BUS_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// `SERVICE_DIR`, root directory for persisted artefacts (raw HTML snapshots), default `.`.
pub fn service_dir() -> String {
    std::env::var("SERVICE_DIR").unwrap_or_else(|_| ".".to_string())
}

// ---------------------------------------------------------------------------
// get_crawling_config() — read-only crawling configuration. Real deployments wire
// this from their own profile store; the defaults here just turn on the
// commonly-safe subset of defensive measures.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementToggles {
    pub enable_user_agent_rotation: bool,
    pub enable_proxy_pool: bool,
    pub enable_stealth_headers: bool,
    pub enable_modal_handler: bool,
    pub enable_paywall_detector: bool,
    pub enable_rate_limiting: bool,
}

impl Default for EnhancementToggles {
    fn default() -> Self {
        EnhancementToggles {
            enable_user_agent_rotation: true,
            enable_proxy_pool: false,
            enable_stealth_headers: true,
            enable_modal_handler: true,
            enable_paywall_detector: true,
            enable_rate_limiting: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentCookieDefaults {
    pub cookie_name: Option<String>,
    pub cookie_value: Option<String>,
    pub enable_cookie_injection: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaywallDetectorOptions {
    pub enable_remote_analysis: bool,
    pub max_remote_chars: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlingConfig {
    pub enhancements: EnhancementToggles,
    pub user_agent_pool: Vec<String>,
    pub proxy_pool: Vec<String>,
    pub stealth_profiles: HashMap<String, Vec<(String, String)>>,
    pub consent_cookie: ConsentCookieDefaults,
    pub paywall_detector: PaywallDetectorOptions,
}

/// Loads the read-only crawling configuration. Out of scope: where these values come
/// from (database, file, remote config service) — this returns conservative,
/// safe-by-default values so the crawler is usable standalone.
pub fn get_crawling_config() -> CrawlingConfig {
    CrawlingConfig {
        enhancements: EnhancementToggles::default(),
        user_agent_pool: Vec::new(),
        proxy_pool: Vec::new(),
        stealth_profiles: HashMap::new(),
        consent_cookie: ConsentCookieDefaults {
            cookie_name: Some("justnews_cookie_consent".to_string()),
            cookie_value: Some("1".to_string()),
            enable_cookie_injection: true,
        },
        paywall_detector: PaywallDetectorOptions {
            enable_remote_analysis: false,
            max_remote_chars: 6000,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_site_batches_defaults_to_four() {
        std::env::remove_var("UNIFIED_CRAWLER_MAX_SITE_BATCHES");
        assert_eq!(max_site_batches(), 4);
    }

    #[test]
    fn hitl_service_url_trims_trailing_slash() {
        std::env::set_var("HITL_SERVICE_URL", "http://example.test:8040/");
        assert_eq!(hitl_service_url(), "http://example.test:8040");
        std::env::remove_var("HITL_SERVICE_URL");
    }

    #[test]
    fn normalization_mode_parses_case_insensitively() {
        std::env::set_var("ARTICLE_URL_NORMALIZATION", "LENIENT");
        assert_eq!(url_normalization_mode(), UrlNormalizationMode::Lenient);
        std::env::remove_var("ARTICLE_URL_NORMALIZATION");
    }
}
