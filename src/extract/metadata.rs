//! DOM-hint metadata supplementation: canonical link, OpenGraph, and article meta tags.

use scraper::{Html, Selector};

#[derive(Debug, Default, Clone)]
pub struct DomHints {
    pub canonical_url: Option<String>,
    pub published: Option<String>,
    pub author: Option<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
}

fn attr(document: &Html, selector_text: &str, attr_name: &str) -> Option<String> {
    let selector = Selector::parse(selector_text).ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr(attr_name))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves `candidate` against `base_url` when it is relative; returns it unchanged
/// if it is already absolute or the base fails to parse.
pub fn resolve_against(base_url: &str, candidate: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(base) => base.join(candidate).map(|u| u.to_string()).unwrap_or_else(|_| candidate.to_string()),
        Err(_) => candidate.to_string(),
    }
}

pub fn extract_dom_hints(document: &Html, source_url: &str) -> DomHints {
    let canonical_url = attr(document, "link[rel='canonical']", "href")
        .or_else(|| attr(document, "meta[property='og:url']", "content"))
        .map(|raw| resolve_against(source_url, &raw));

    let published = attr(document, "meta[property='article:published_time']", "content")
        .or_else(|| attr(document, "meta[name='article:published_time']", "content"));

    let author = attr(document, "meta[name='author']", "content");

    let section = attr(document, "meta[property='article:section']", "content");

    let tags = attr(document, "meta[property='article:tag']", "content")
        .map(|raw| raw.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();

    DomHints {
        canonical_url,
        published,
        author,
        section,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_canonical_and_article_meta() {
        let html = r#"
            <html><head>
            <link rel="canonical" href="/a/story">
            <meta property="article:published_time" content="2024-03-01T00:00:00Z">
            <meta name="author" content="Jane Doe">
            <meta property="article:section" content="Politics">
            <meta property="article:tag" content="elections, polling">
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        let hints = extract_dom_hints(&doc, "https://example.com/current");
        assert_eq!(hints.canonical_url.as_deref(), Some("https://example.com/a/story"));
        assert_eq!(hints.published.as_deref(), Some("2024-03-01T00:00:00Z"));
        assert_eq!(hints.author.as_deref(), Some("Jane Doe"));
        assert_eq!(hints.section.as_deref(), Some("Politics"));
        assert_eq!(hints.tags, vec!["elections".to_string(), "polling".to_string()]);
    }

    #[test]
    fn falls_back_to_og_url_when_no_canonical_link() {
        let html = r#"<html><head><meta property="og:url" content="https://example.com/b"></head></html>"#;
        let doc = Html::parse_document(html);
        let hints = extract_dom_hints(&doc, "https://example.com/current");
        assert_eq!(hints.canonical_url.as_deref(), Some("https://example.com/b"));
    }
}
