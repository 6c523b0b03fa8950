//! Plain-text sanitiser: the last-resort tier. Strips script/style/comments and tags,
//! then collapses whitespace. Always produces something, even if it is noisy.

use scraper::Html;

/// Removes `<script>`/`<style>` content and tag markup entirely, leaving flattened
/// whitespace-collapsed text.
pub fn sanitise_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let skip = ["script", "style"];

    let mut out = String::new();
    for node in document.root_element().descendants() {
        if let Some(element) = node.value().as_element() {
            if skip.contains(&element.name()) {
                continue;
            }
        }
        if let Some(text) = node.value().as_text() {
            let parent_is_skipped = node
                .parent()
                .and_then(|p| p.value().as_element())
                .map(|e| skip.contains(&e.name()))
                .unwrap_or(false);
            if !parent_is_skipped {
                out.push_str(text);
                out.push(' ');
            }
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>.x{color:red}</style></head><body><script>var x=1;</script><p>Visible text</p></body></html>";
        let text = sanitise_to_text(html);
        assert_eq!(text, "Visible text");
    }

    #[test]
    fn collapses_whitespace() {
        let html = "<p>a   b\n\nc</p>";
        assert_eq!(sanitise_to_text(html), "a b c");
    }
}
