//! Boilerplate-pruning fallback tier: only used when earlier tiers produced nothing.
//! Keeps paragraph-like blocks that look like prose and discards short nav/footer noise.

use scraper::{Html, Selector};

const MIN_BLOCK_WORDS: usize = 6;
const NOISE_MARKERS: &[&str] = &["cookie", "subscribe now", "sign up", "all rights reserved", "advertisement"];

fn looks_like_noise(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    NOISE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Keeps `<p>`/`<li>` blocks with at least [`MIN_BLOCK_WORDS`] words that don't match a
/// known noise marker, and joins what survives with blank lines.
pub fn extract_boilerplate_pruned(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("p, li") else {
        return String::new();
    };

    let mut kept = Vec::new();
    for el in document.select(&selector) {
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.split_whitespace().count() >= MIN_BLOCK_WORDS && !looks_like_noise(&text) {
            kept.push(text);
        }
    }

    kept.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_long_paragraphs_and_drops_noise() {
        let html = r#"
            <html><body>
            <p>Subscribe now for more updates on this story.</p>
            <p>A long-form paragraph describing the event in sufficient detail to survive pruning.</p>
            </body></html>
        "#;
        let text = extract_boilerplate_pruned(html);
        assert!(text.contains("long-form paragraph"));
        assert!(!text.contains("Subscribe now"));
    }
}
