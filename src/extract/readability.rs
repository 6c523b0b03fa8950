//! Readability-style fallback tier: runs when the primary extractor found no text or
//! fell short of `MIN_WORDS`. Only adopted if its output is strictly longer than what
//! the primary tier already produced.

use scraper::Html;

#[derive(Debug, Default, Clone)]
pub struct ReadabilityExtraction {
    pub title: Option<String>,
    pub text: String,
}

/// Runs the `readability` crate against `html`/`url` and flattens its cleaned HTML
/// back down to plain text. Returns `None` on any extraction failure.
pub fn extract_readability(html: &str, url: &str) -> Option<ReadabilityExtraction> {
    let base = url::Url::parse(url).ok()?;
    let mut reader = html.as_bytes();
    let product = readability::extractor::extract(&mut reader, &base).ok()?;

    let fragment = Html::parse_fragment(&product.content);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() {
        return None;
    }

    Some(ReadabilityExtraction {
        title: Some(product.title).filter(|t| !t.trim().is_empty()),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_invalid_url() {
        assert!(extract_readability("<html></html>", "not-a-url").is_none());
    }
}
