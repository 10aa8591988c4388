use absa_core::{AnalyzedDocument, SinkError};
use async_trait::async_trait;

/// A document the store refused. The rest of its batch may still be indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Per-document result of one successful bulk request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub indexed: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn all_indexed(docs: &[AnalyzedDocument]) -> Self {
        Self {
            indexed: docs.iter().map(|d| d.id.clone()).collect(),
            failed: Vec::new(),
        }
    }
}

/// Destination for analyzed documents.
///
/// `write_batch` returns `Err` only when the whole request failed (and may
/// be retried); documents rejected individually are reported in the
/// [`BatchReport`] and never retried.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// One-time setup (index template, output file). Failures are reported
    /// to the caller, which decides whether they matter.
    async fn prepare(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_batch(&self, docs: &[AnalyzedDocument]) -> Result<BatchReport, SinkError>;

    fn describe(&self) -> String;
}
