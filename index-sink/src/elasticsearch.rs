//! Elasticsearch `_bulk` sink.
//!
//! Documents go to a monthly index, `<prefix>-YYYY-MM`, keyed by post id so a
//! replayed post overwrites its earlier copy.

use crate::sink::{BatchReport, IndexSink, ItemFailure};
use absa_core::{AnalyzedDocument, SinkConfig, SinkError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ElasticsearchSink {
    client: Client,
    host: String,
    prefix: String,
}

impl ElasticsearchSink {
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SinkError::Unavailable {
                endpoint: config.es_host.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            host: config.es_host.trim_end_matches('/').to_string(),
            prefix: config.index_prefix.clone(),
        })
    }

    pub fn index_name(&self, at: DateTime<Utc>) -> String {
        index_name(&self.prefix, at)
    }

    pub fn template_name(&self) -> String {
        format!("{}-tpl", self.prefix)
    }

    fn unavailable(&self, error: reqwest::Error) -> SinkError {
        SinkError::Unavailable {
            endpoint: self.host.clone(),
            reason: error.to_string(),
        }
    }

    /// Install the index template covering `<prefix>-*`.
    pub async fn ensure_template(&self) -> Result<(), SinkError> {
        let url = format!("{}/_index_template/{}", self.host, self.template_name());
        let response = self
            .client
            .put(&url)
            .json(&index_template(&self.prefix))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status_code: status.as_u16(),
            });
        }
        info!("Index template {} ensured", self.template_name());
        Ok(())
    }
}

pub fn index_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, at.format("%Y-%m"))
}

/// NDJSON body for `_bulk`: an action line and a source line per document.
pub fn bulk_body(prefix: &str, docs: &[AnalyzedDocument]) -> Result<String, SinkError> {
    let mut body = String::new();
    for doc in docs {
        let action = json!({
            "index": {
                "_index": index_name(prefix, doc.ingested_at),
                "_id": doc.id,
            }
        });
        let source = serde_json::to_string(doc).map_err(|e| SinkError::InvalidResponse {
            details: format!("cannot serialize document {}: {}", doc.id, e),
        })?;
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// Split a `_bulk` response into indexed and refused documents.
pub fn parse_bulk_response(
    response: &Value,
    docs: &[AnalyzedDocument],
) -> Result<BatchReport, SinkError> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SinkError::InvalidResponse {
            details: "bulk response has no items".to_string(),
        })?;

    if items.len() != docs.len() {
        return Err(SinkError::InvalidResponse {
            details: format!("{} items for {} documents", items.len(), docs.len()),
        });
    }

    let mut report = BatchReport::default();
    for (item, doc) in items.iter().zip(docs) {
        let result = item.get("index").unwrap_or(item);
        let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);

        match result.get("error") {
            None if (200..300).contains(&status) => report.indexed.push(doc.id.clone()),
            error => {
                let reason = error
                    .and_then(|e| e.get("reason").or_else(|| e.get("type")))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("status {}", status));
                report.failed.push(ItemFailure {
                    id: doc.id.clone(),
                    reason,
                });
            }
        }
    }
    Ok(report)
}

pub fn index_template(prefix: &str) -> Value {
    let score = json!({
        "properties": {
            "label": { "type": "keyword" },
            "confidence": { "type": "float" },
            "signals": { "type": "keyword" },
        }
    });

    json!({
        "index_patterns": [format!("{}-*", prefix)],
        "template": {
            "settings": {
                "number_of_shards": 1,
                "number_of_replicas": 0,
                "refresh_interval": "5s"
            },
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "text": { "type": "text" },
                    "title": { "type": "text" },
                    "author": { "type": "keyword" },
                    "author_username": { "type": "keyword" },
                    "instance": { "type": "keyword" },
                    "language": { "type": "keyword" },
                    "created_at": { "type": "date" },
                    "ingested_at": { "type": "date" },
                    "url": { "type": "keyword" },
                    "hashtags": { "type": "keyword" },
                    "favourites": { "type": "long" },
                    "reblogs": { "type": "long" },
                    "replies": { "type": "long" },
                    "score": { "type": "long" },
                    "aspects": { "type": "keyword" },
                    "aspect_sentiments": {
                        "properties": {
                            "aspect": { "type": "keyword" },
                            "label": { "type": "keyword" },
                            "confidence": { "type": "float" }
                        }
                    },
                    "sentiment": score.clone(),
                    "emotion": score.clone(),
                    "tone": score.clone(),
                    "topic": score,
                    "emotions_flat": { "type": "keyword" },
                    "absent_scorers": { "type": "keyword" },
                    "filter_mode": { "type": "keyword" },
                    "processing_ms": { "type": "long" }
                }
            }
        }
    })
}

#[async_trait]
impl IndexSink for ElasticsearchSink {
    async fn prepare(&self) -> Result<(), SinkError> {
        self.ensure_template().await
    }

    async fn write_batch(&self, docs: &[AnalyzedDocument]) -> Result<BatchReport, SinkError> {
        if docs.is_empty() {
            return Ok(BatchReport::default());
        }

        let body = bulk_body(&self.prefix, docs)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.host))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || !status.is_success() {
            return Err(SinkError::Rejected {
                status_code: status.as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(|e| SinkError::InvalidResponse {
            details: e.to_string(),
        })?;
        let report = parse_bulk_response(&payload, docs)?;

        if report.failed.is_empty() {
            debug!("Indexed {} documents", report.indexed.len());
        } else {
            warn!(
                "Bulk write: {} indexed, {} refused",
                report.indexed.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn describe(&self) -> String {
        format!("elasticsearch {} ({}-*)", self.host, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_document;
    use chrono::TimeZone;

    #[test]
    fn test_index_name_is_monthly() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(index_name("mastodon-trends", at), "mastodon-trends-2025-03");
    }

    #[test]
    fn test_bulk_body_pairs_action_and_source() {
        let docs = vec![sample_document("a"), sample_document("b")];
        let body = bulk_body("toots", &docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], "a");
        assert!(action["index"]["_index"]
            .as_str()
            .unwrap()
            .starts_with("toots-"));

        let source: Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(source["id"], "b");
    }

    #[test]
    fn test_parse_bulk_response_splits_items() {
        let docs = vec![sample_document("a"), sample_document("b")];
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "bad date" } } }
            ]
        });

        let report = parse_bulk_response(&response, &docs).unwrap();
        assert_eq!(report.indexed, vec!["a"]);
        assert_eq!(
            report.failed,
            vec![ItemFailure {
                id: "b".to_string(),
                reason: "bad date".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_bulk_response_rejects_mismatch() {
        let docs = vec![sample_document("a")];
        assert!(matches!(
            parse_bulk_response(&json!({ "items": [] }), &docs),
            Err(SinkError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_bulk_response(&json!({}), &docs),
            Err(SinkError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_template_covers_prefix() {
        let template = index_template("toots");
        assert_eq!(template["index_patterns"][0], "toots-*");
        assert_eq!(
            template["template"]["mappings"]["properties"]["emotions_flat"]["type"],
            "keyword"
        );
    }

    #[test]
    fn test_sink_names() {
        let sink = ElasticsearchSink::new(&SinkConfig {
            es_host: "http://es:9200/".to_string(),
            index_prefix: "toots".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sink.template_name(), "toots-tpl");
        assert_eq!(sink.describe(), "elasticsearch http://es:9200 (toots-*)");
    }
}
