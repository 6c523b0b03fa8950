//! Primary structured extractor: tries known article-body containers before falling
//! back to the readability/boilerplate/sanitiser tiers.

use scraper::{Html, Selector};

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop='articleBody']",
    "div.article-body",
    "div.story-body",
    "div.entry-content",
    "div.post-content",
    "main",
];

#[derive(Debug, Default, Clone)]
pub struct PrimaryExtraction {
    pub title: Option<String>,
    pub text: String,
}

fn first_text(document: &Html, selector_text: &str) -> Option<String> {
    let selector = Selector::parse(selector_text).ok()?;
    document.select(&selector).next().map(|el| el.text().collect::<Vec<_>>().join(" "))
}

fn title_from_head(document: &Html) -> Option<String> {
    first_text(document, "h1").or_else(|| first_text(document, "title")).map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Picks the first matching container in [`CONTENT_SELECTORS`] order and returns its
/// collapsed text, plus a best-effort title.
pub fn extract_primary(document: &Html) -> PrimaryExtraction {
    let title = title_from_head(document);

    for selector_text in CONTENT_SELECTORS {
        if let Some(raw) = first_text(document, selector_text) {
            let text = collapse_whitespace(&raw);
            if !text.is_empty() {
                return PrimaryExtraction { title, text };
            }
        }
    }

    PrimaryExtraction { title, text: String::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_article_tag_contents() {
        let html = "<html><head><title>Headline</title></head><body><article><p>Body text goes here.</p></article></body></html>";
        let doc = Html::parse_document(html);
        let out = extract_primary(&doc);
        assert_eq!(out.title.as_deref(), Some("Headline"));
        assert_eq!(out.text, "Body text goes here.");
    }

    #[test]
    fn returns_empty_text_when_no_known_container() {
        let html = "<html><body><div class=\"sidebar\">ignore me</div></body></html>";
        let doc = Html::parse_document(html);
        let out = extract_primary(&doc);
        assert!(out.text.is_empty());
    }
}
