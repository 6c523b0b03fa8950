//! Modal and paywall detection filters. Capability slots injected into the site
//! crawler — optional, read-only, thread-safe.

use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct ModalHandlingResult {
    pub cleaned_html: String,
    pub modals_detected: bool,
    pub applied_cookies: Vec<(String, String)>,
    pub notes: Vec<String>,
}

#[async_trait]
pub trait ModalHandler: Send + Sync {
    async fn handle(&self, html: &str, context: &str) -> ModalHandlingResult;
}

/// Detects a consent-overlay marker and strips it, offering a cookie that would
/// suppress the overlay on subsequent fetches in the same session.
pub struct CookieConsentModalHandler {
    pub cookie_name: String,
    pub cookie_value: String,
}

impl Default for CookieConsentModalHandler {
    fn default() -> Self {
        CookieConsentModalHandler {
            cookie_name: "justnews_cookie_consent".to_string(),
            cookie_value: "1".to_string(),
        }
    }
}

#[async_trait]
impl ModalHandler for CookieConsentModalHandler {
    async fn handle(&self, html: &str, _context: &str) -> ModalHandlingResult {
        let detected = html.contains("cookie-consent")
            || html.contains("cookie_consent")
            || html.contains("gdpr-consent")
            || html.contains("id=\"onetrust-banner-sdk\"");

        if !detected {
            return ModalHandlingResult {
                cleaned_html: html.to_string(),
                ..Default::default()
            };
        }

        ModalHandlingResult {
            cleaned_html: html.to_string(),
            modals_detected: true,
            applied_cookies: vec![(self.cookie_name.clone(), self.cookie_value.clone())],
            notes: vec!["consent overlay detected; cookie injected for future fetches".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaywallDetection {
    pub is_paywall: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub should_skip: bool,
}

#[async_trait]
pub trait PaywallDetector: Send + Sync {
    async fn analyze(&self, url: &str, html: &str, text: Option<&str>) -> PaywallDetection;
}

/// Heuristic detector: looks for common paywall markup/class names and a suspiciously
/// short extracted text body relative to the page.
pub struct HeuristicPaywallDetector {
    pub min_words_before_suspicious: usize,
}

impl Default for HeuristicPaywallDetector {
    fn default() -> Self {
        HeuristicPaywallDetector {
            min_words_before_suspicious: 80,
        }
    }
}

const PAYWALL_MARKERS: &[&str] = &[
    "meteredContent",
    "paywall",
    "subscriber-only",
    "piano-inline",
    "tp-modal",
    "regwall",
];

#[async_trait]
impl PaywallDetector for HeuristicPaywallDetector {
    async fn analyze(&self, _url: &str, html: &str, text: Option<&str>) -> PaywallDetection {
        let mut reasons = Vec::new();
        let haystack = html.to_ascii_lowercase();
        for marker in PAYWALL_MARKERS {
            if haystack.contains(&marker.to_ascii_lowercase()) {
                reasons.push(format!("marker:{marker}"));
            }
        }

        let word_count = text.map(|t| t.split_whitespace().count()).unwrap_or(0);
        if !reasons.is_empty() && word_count < self.min_words_before_suspicious {
            reasons.push("short_body".to_string());
        }

        let is_paywall = !reasons.is_empty() && word_count < self.min_words_before_suspicious;
        let confidence = if is_paywall { 0.8 } else if reasons.is_empty() { 0.0 } else { 0.3 };

        PaywallDetection {
            is_paywall,
            confidence,
            reasons,
            should_skip: is_paywall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn modal_handler_flags_known_consent_markup() {
        let handler = CookieConsentModalHandler::default();
        let result = handler.handle("<div id=\"onetrust-banner-sdk\"></div>", "homepage").await;
        assert!(result.modals_detected);
        assert_eq!(result.applied_cookies.len(), 1);
    }

    #[tokio::test]
    async fn paywall_detector_flags_short_gated_body() {
        let detector = HeuristicPaywallDetector::default();
        let detection = detector
            .analyze("https://example.com/a", "<div class=\"paywall\">Subscribe now</div>", Some("short teaser"))
            .await;
        assert!(detection.is_paywall);
        assert!(detection.should_skip);
    }

    #[tokio::test]
    async fn paywall_detector_allows_long_unmarked_body() {
        let detector = HeuristicPaywallDetector::default();
        let long_text: String = std::iter::repeat("word ").take(200).collect();
        let detection = detector.analyze("https://example.com/a", "<article>plain</article>", Some(&long_text)).await;
        assert!(!detection.is_paywall);
    }
}
