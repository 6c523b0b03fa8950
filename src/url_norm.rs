//! Canonical URL normalization and hashing. Pure, dependency-light functions
//! deliberately kept free of crawler state so they can be reused verbatim by a
//! downstream storage service without risking divergence.

use std::fmt::Write as _;

use regex::Regex;
use sha2::Digest as _;
use thiserror::Error;

use crate::core::config::UrlNormalizationMode;

const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_", "spm", "icid"];
const TRACKING_PARAM_KEYS: &[&str] = &["fbclid", "gclid", "mc_eid", "mc_cid", "mkt_tok", "cmpid"];

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    TRACKING_PARAM_KEYS.contains(&lower.as_str())
        || TRACKING_PARAM_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn collapse_slashes(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return path.to_string();
    }
    let collapsed = Regex::new(r"/{2,}").unwrap().replace_all(path, "/").to_string();
    let trimmed = collapsed.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn strip_tracking_query(query: &str) -> String {
    let kept: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish()
}

/// Normalizes `canonical` (preferred) or `url` into the deduplication key string.
///
/// `mode` resolves to [`crate::core::config::url_normalization_mode`] when `None`.
/// `none` mode returns the candidate untouched. `strict` (default) lowercases
/// scheme/host, drops default ports, collapses path slashes, strips the fragment,
/// and removes tracking query parameters. `lenient` does everything strict does
/// except leave the query string alone.
pub fn normalize_article_url(url: &str, canonical: Option<&str>, mode: Option<UrlNormalizationMode>) -> String {
    let mode = mode.unwrap_or_else(crate::core::config::url_normalization_mode);
    let candidate = canonical.filter(|c| !c.trim().is_empty()).unwrap_or(url);

    if mode == UrlNormalizationMode::None {
        return candidate.to_string();
    }

    let with_scheme = if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("https://{candidate}")
    };

    let mut parsed = match url::Url::parse(&with_scheme) {
        Ok(u) => u,
        Err(_) => return candidate.to_string(),
    };

    let new_path = collapse_slashes(parsed.path());
    parsed.set_path(&new_path);
    parsed.set_fragment(None);

    if mode == UrlNormalizationMode::Strict {
        let stripped = strip_tracking_query(parsed.query().unwrap_or(""));
        if stripped.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.set_query(Some(&stripped));
        }
    }

    parsed.to_string()
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("unsupported url hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Hex digest of `normalized_url` bytes under `algorithm` (resolved from
/// [`crate::core::config::url_hash_algo`] when `None`). Deterministic across runs
/// and processes for the same input.
pub fn hash_article_url(normalized_url: &str, algorithm: Option<&str>) -> Result<String, HashError> {
    let algo = algorithm
        .map(|a| a.to_string())
        .unwrap_or_else(crate::core::config::url_hash_algo);

    match algo.to_ascii_lowercase().as_str() {
        "sha256" => {
            let mut hasher = sha2::Sha256::new();
            hasher.update(normalized_url.as_bytes());
            Ok(hex_encode(&hasher.finalize()))
        }
        "sha1" => {
            use sha1::Sha1;
            let mut hasher = Sha1::new();
            hasher.update(normalized_url.as_bytes());
            Ok(hex_encode(&hasher.finalize()))
        }
        other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
