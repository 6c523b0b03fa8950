//! Ingestion Client (C10): posts a built article to the storage RPC and classifies
//! the response into new/duplicate/error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::core::config::mcp_bus_url;
use crate::core::types::{ArticleRecord, IngestionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    New,
    Duplicate,
    Error(String),
}

#[async_trait]
pub trait IngestionClient: Send + Sync {
    async fn ingest(&self, article: &ArticleRecord) -> IngestOutcome;
}

pub struct RpcIngestionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RpcIngestionClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with static config");
        RpcIngestionClient {
            client,
            endpoint: format!("{}/call", mcp_bus_url()),
        }
    }

    fn build_payload(article: &ArticleRecord) -> serde_json::Value {
        json!({
            "agent": "memory",
            "tool": "ingest_article",
            "kwargs": {
                "article_payload": {
                    "url": article.url,
                    "canonical": article.canonical,
                    "normalized_url": article.normalized_url,
                    "url_hash": article.url_hash,
                    "title": article.title,
                    "content": article.content,
                    "domain": article.domain,
                    "source_name": article.source_name,
                    "language": article.language,
                    "authors": article.authors,
                    "section": article.section,
                    "tags": article.tags,
                    "publication_date": article.publication_date,
                    "raw_html_ref": article.raw_html_ref,
                },
                "statements": Vec::<serde_json::Value>::new(),
            }
        })
    }
}

impl Default for RpcIngestionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IngestionClient for RpcIngestionClient {
    async fn ingest(&self, article: &ArticleRecord) -> IngestOutcome {
        let payload = Self::build_payload(article);

        let response = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(resp) => resp,
            Err(err) => return IngestOutcome::Error(err.to_string()),
        };

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(err) => return IngestOutcome::Error(err.to_string()),
        };

        classify_response(&body)
    }
}

/// `{status, data: {status, duplicate?, error?}}`. The effective status is
/// `data.status` when present, else the top-level `status`.
fn classify_response(body: &serde_json::Value) -> IngestOutcome {
    let data = body.get("data");
    let effective_status = data
        .and_then(|d| d.get("status"))
        .or_else(|| body.get("status"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if !matches!(effective_status, "ok" | "success") {
        let error = data
            .and_then(|d| d.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or("ingestion failed")
            .to_string();
        return IngestOutcome::Error(error);
    }

    let duplicate = data.and_then(|d| d.get("duplicate")).and_then(|v| v.as_bool()).unwrap_or(false);

    if duplicate {
        IngestOutcome::Duplicate
    } else {
        IngestOutcome::New
    }
}

impl IngestOutcome {
    pub fn as_ingestion_status(&self) -> IngestionStatus {
        match self {
            IngestOutcome::New => IngestionStatus::New,
            IngestOutcome::Duplicate => IngestionStatus::Duplicate,
            IngestOutcome::Error(_) => IngestionStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_new_article() {
        let body = json!({"status": "ok", "data": {"status": "ok", "duplicate": false}});
        assert_eq!(classify_response(&body), IngestOutcome::New);
    }

    #[test]
    fn classifies_duplicate_article() {
        let body = json!({"status": "ok", "data": {"status": "ok", "duplicate": true}});
        assert_eq!(classify_response(&body), IngestOutcome::Duplicate);
    }

    #[test]
    fn classifies_error_when_status_not_ok() {
        let body = json!({"status": "error", "data": {"status": "error", "error": "db unavailable"}});
        assert_eq!(classify_response(&body), IngestOutcome::Error("db unavailable".to_string()));
    }

    #[test]
    fn falls_back_to_top_level_status_when_data_missing() {
        let body = json!({"status": "success"});
        assert_eq!(classify_response(&body), IngestOutcome::New);
    }
}
