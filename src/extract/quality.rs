//! Confidence scoring and review-flagging for extracted article text.

use crate::core::config::{min_text_html_ratio, min_words};

#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    pub confidence: f64,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
}

const CONFIDENT_DEFAULT: f64 = 0.75;
const NEEDS_REVIEW_DEFAULT: f64 = 0.35;

/// Flags extracted text for human review when it is too short, too sparse relative
/// to the surrounding markup, or looks like unreplaced placeholder copy.
pub fn assess(text: &str, html: &str) -> QualityAssessment {
    let mut reasons = Vec::new();

    let word_count = text.split_whitespace().count();
    if word_count < min_words() {
        reasons.push(format!("word_count below {}", min_words()));
    }

    let ratio = if html.is_empty() { 0.0 } else { text.len() as f64 / html.len() as f64 };
    if ratio < min_text_html_ratio() {
        reasons.push(format!("text/html ratio below {:.4}", min_text_html_ratio()));
    }

    if text.to_ascii_lowercase().contains("lorem ipsum") {
        reasons.push("placeholder text detected".to_string());
    }

    let needs_review = !reasons.is_empty();
    let confidence = if needs_review { NEEDS_REVIEW_DEFAULT } else { CONFIDENT_DEFAULT };

    QualityAssessment {
        confidence,
        needs_review,
        review_reasons: reasons,
    }
}
