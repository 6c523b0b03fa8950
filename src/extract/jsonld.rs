//! JSON-LD structured metadata extraction. Schema.org `Article`/`NewsArticle`/
//! `BlogPosting` blocks map directly onto the Article Record's title/content/authors;
//! anything else is kept as a generic name/description pair in `structured_metadata`.

use scraper::{Html, Selector};
use serde_json::Value;

#[derive(Debug, Default, Clone)]
pub struct JsonLdArticle {
    pub title: Option<String>,
    pub body: Option<String>,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub raw: Vec<Value>,
}

pub fn extract_json_ld(document: &Html) -> Option<JsonLdArticle> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;
    let mut found = JsonLdArticle::default();
    let mut any = false;

    for script in document.select(&selector) {
        let json_text = script.inner_html();
        if json_text.trim().is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(&json_text) {
            if collect(&value, &mut found) {
                any = true;
            }
        }
    }

    if any {
        Some(found)
    } else {
        None
    }
}

fn collect(value: &Value, out: &mut JsonLdArticle) -> bool {
    match value {
        Value::Array(items) => {
            let mut any = false;
            for item in items {
                any |= collect(item, out);
            }
            any
        }
        Value::Object(map) => {
            let mut any = false;
            if let Some(graph) = map.get("@graph") {
                any |= collect(graph, out);
            }

            match map.get("@type").and_then(|v| v.as_str()).unwrap_or("") {
                "Article" | "NewsArticle" | "BlogPosting" => {
                    if let Some(headline) = string_value(map.get("headline")) {
                        out.title.get_or_insert(headline);
                    }
                    if let Some(body) = string_value(map.get("articleBody")) {
                        if !body.trim().is_empty() {
                            out.body.get_or_insert(body);
                            any = true;
                        }
                    }
                    if let Some(author) = author_names(map.get("author")) {
                        if out.authors.is_empty() {
                            out.authors = author;
                        }
                    }
                    if let Some(published) = string_value(map.get("datePublished")) {
                        out.published.get_or_insert(published);
                    }
                    out.raw.push(value.clone());
                    any
                }
                _ => {
                    if let Some(name) = string_value(map.get("name")) {
                        out.title.get_or_insert(name);
                        out.raw.push(value.clone());
                        true
                    } else {
                        any
                    }
                }
            }
        }
        _ => false,
    }
}

fn string_value(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Array(items)) => items.iter().find_map(|item| string_value(Some(item))),
        Some(Value::Object(map)) => map.get("name").and_then(|v| v.as_str()).map(|s| s.trim().to_string()),
        _ => None,
    }
}

fn author_names(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::String(s)) => Some(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => {
            let names: Vec<String> = items.iter().filter_map(|item| string_value(Some(item))).collect();
            if names.is_empty() {
                None
            } else {
                Some(names)
            }
        }
        Some(Value::Object(_)) => string_value(value).map(|n| vec![n]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_news_article_block() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">
            {"@type":"NewsArticle","headline":"Title","articleBody":"Body text here.","author":{"name":"Jane Doe"},"datePublished":"2024-01-01"}
            </script>
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        let found = extract_json_ld(&doc).unwrap();
        assert_eq!(found.title.as_deref(), Some("Title"));
        assert_eq!(found.body.as_deref(), Some("Body text here."));
        assert_eq!(found.authors, vec!["Jane Doe".to_string()]);
    }

    #[test]
    fn returns_none_without_ld_json() {
        let doc = Html::parse_document("<html><body>no ld+json here</body></html>");
        assert!(extract_json_ld(&doc).is_none());
    }
}
