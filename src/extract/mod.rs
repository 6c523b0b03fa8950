//! Tiered text extraction and URL/metadata normalization pipeline. Pure with respect
//! to its inputs aside from the raw-HTML snapshot side effect.

pub mod boilerplate;
pub mod jsonld;
pub mod metadata;
pub mod primary;
pub mod quality;
pub mod readability;
pub mod sanitiser;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use scraper::Html;
use sha2::Digest as _;

use crate::core::config::service_dir;
use crate::core::types::ExtractionOutcome;

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn persist_raw_html(html: &str, url: &str) -> Option<String> {
    let now = Utc::now();
    let mut hasher = sha2::Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let short_sha = digest.iter().take(8).map(|b| format!("{b:02x}")).collect::<String>();
    let id = uuid::Uuid::new_v4();

    let dir: PathBuf = PathBuf::from(service_dir())
        .join("archive_storage")
        .join("raw_html")
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string());

    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!(?err, "failed to create raw html snapshot directory");
        return None;
    }

    let filename = format!("{}_{short_sha}_{id}.html", now.format("%Y%m%dT%H%M%S"));
    let path = dir.join(&filename);

    match std::fs::write(&path, html) {
        Ok(()) => Some(path.to_string_lossy().to_string()),
        Err(err) => {
            tracing::warn!(?err, path = %path.display(), "failed to persist raw html snapshot");
            None
        }
    }
}

/// Runs the full tier chain against `html` fetched from `url`, merges structured
/// metadata from JSON-LD and DOM hints, assesses quality, and persists the raw HTML
/// as a side effect.
pub fn extract(html: &str, url: &str) -> ExtractionOutcome {
    let document = Html::parse_document(html);
    let mut fallbacks_attempted = Vec::new();

    let primary_out = primary::extract_primary(&document);
    let mut best_text = primary_out.text.clone();
    let mut extractor_used = "primary".to_string();
    let mut title = primary_out.title.clone();

    if best_text.is_empty() || word_count(&best_text) < crate::core::config::min_words() {
        if let Some(readable) = readability::extract_readability(html, url) {
            fallbacks_attempted.push("readability".to_string());
            if readable.text.len() > best_text.len() {
                best_text = readable.text;
                extractor_used = "readability".to_string();
                title = title.or(readable.title);
            }
        }
    }

    if best_text.is_empty() {
        let pruned = boilerplate::extract_boilerplate_pruned(html);
        fallbacks_attempted.push("boilerplate_pruned".to_string());
        if !pruned.is_empty() {
            best_text = pruned;
            extractor_used = "boilerplate_pruned".to_string();
        }
    }

    if best_text.is_empty() {
        best_text = sanitiser::sanitise_to_text(html);
        fallbacks_attempted.push("plain_text_sanitiser".to_string());
        extractor_used = "plain_text_sanitiser".to_string();
    }

    let json_ld = jsonld::extract_json_ld(&document);
    let dom_hints = metadata::extract_dom_hints(&document, url);

    if title.is_none() {
        title = json_ld.as_ref().and_then(|j| j.title.clone());
    }

    let authors = json_ld.as_ref().map(|j| j.authors.clone()).filter(|a| !a.is_empty()).unwrap_or_else(|| {
        dom_hints.author.clone().map(|a| vec![a]).unwrap_or_default()
    });

    let publication_date = json_ld.as_ref().and_then(|j| j.published.clone()).or_else(|| dom_hints.published.clone());

    let canonical_url = dom_hints.canonical_url.clone();

    let language = whatlang::detect(&best_text).map(|info| info.lang().code().to_string());

    let ratio = if html.is_empty() { 0.0 } else { best_text.len() as f64 / html.len() as f64 };
    let boilerplate_ratio = (1.0 - ratio).clamp(0.0, 1.0);

    let assessment = quality::assess(&best_text, html);

    let mut structured_metadata: HashMap<String, serde_json::Value> = HashMap::new();
    if let Some(json_ld) = &json_ld {
        structured_metadata.insert("json_ld".to_string(), serde_json::Value::Array(json_ld.raw.clone()));
    }

    let raw_html_path = persist_raw_html(html, url);

    ExtractionOutcome {
        text: best_text.clone(),
        title,
        canonical_url,
        publication_date,
        authors,
        section: dom_hints.section.clone(),
        tags: dom_hints.tags.clone(),
        language,
        extractor_used,
        fallbacks_attempted,
        word_count: word_count(&best_text),
        boilerplate_ratio,
        needs_review: assessment.needs_review,
        review_reasons: assessment.review_reasons,
        metadata: HashMap::new(),
        structured_metadata,
        raw_html_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_tier_wins_when_article_tag_present() {
        let html = format!(
            "<html><head><title>H</title></head><body><article><p>{}</p></article></body></html>",
            "word ".repeat(150)
        );
        let outcome = extract(&html, "https://example.com/a");
        assert_eq!(outcome.extractor_used, "primary");
        assert!(!outcome.needs_review);
    }

    #[test]
    fn falls_through_to_sanitiser_when_no_structured_content() {
        let html = "<html><body><div>short</div></body></html>";
        let outcome = extract(html, "https://example.com/b");
        assert!(outcome.fallbacks_attempted.contains(&"plain_text_sanitiser".to_string()));
        assert!(outcome.needs_review);
    }

    #[test]
    fn json_ld_supplements_title_and_authors() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">
            {"@type":"NewsArticle","headline":"From JSON-LD","author":{"name":"Reporter"}}
            </script>
            </head><body><article><p>some short body</p></article></body></html>
        "#;
        let outcome = extract(html, "https://example.com/c");
        assert_eq!(outcome.authors, vec!["Reporter".to_string()]);
    }
}
