use crate::sink::{BatchReport, IndexSink, ItemFailure};
use absa_core::{AnalyzedDocument, SinkError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tracing::error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON document per line to a local file.
pub struct JsonlSink {
    path: PathBuf,
    // Serializes appends from concurrent flushes.
    write_lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, error: std::io::Error) -> SinkError {
        SinkError::Unavailable {
            endpoint: self.path.display().to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl IndexSink for JsonlSink {
    async fn prepare(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    async fn write_batch(&self, docs: &[AnalyzedDocument]) -> Result<BatchReport, SinkError> {
        let mut report = BatchReport::default();
        let mut buffer = String::new();
        for doc in docs {
            match serde_json::to_string(doc) {
                Ok(line) => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                    report.indexed.push(doc.id.clone());
                }
                Err(e) => report.failed.push(ItemFailure {
                    id: doc.id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let start = file.metadata().await.map_err(|e| self.io_error(e))?.len();

        // Appended whole or not at all.
        let written = match file.write_all(buffer.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(rewind) = truncate_to(&file, start).await {
                error!(
                    "Could not roll back partial batch in {}: {}",
                    self.path.display(),
                    rewind
                );
            }
            return Err(self.io_error(e));
        }

        Ok(report)
    }

    fn describe(&self) -> String {
        format!("jsonl {}", self.path.display())
    }
}

async fn truncate_to(file: &File, len: u64) -> std::io::Result<()> {
    file.set_len(len).await?;
    file.sync_data().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_document;

    #[tokio::test]
    async fn test_appends_one_line_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("out/docs.jsonl"));
        sink.prepare().await.unwrap();

        let report = sink
            .write_batch(&[sample_document("1"), sample_document("2")])
            .await
            .unwrap();
        assert_eq!(report.indexed, vec!["1", "2"]);
        sink.write_batch(&[sample_document("3")]).await.unwrap();

        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let ids: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["id"].to_string())
            .collect();
        assert_eq!(ids, vec!["\"1\"", "\"2\"", "\"3\""]);
    }

    #[tokio::test]
    async fn test_partial_append_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("docs.jsonl"));
        sink.write_batch(&[sample_document("1")]).await.unwrap();
        let before = tokio::fs::read_to_string(sink.path()).await.unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(sink.path())
            .await
            .unwrap();
        let start = file.metadata().await.unwrap().len();
        file.write_all(b"{\"id\":\"2\",\"te").await.unwrap();
        truncate_to(&file, start).await.unwrap();
        drop(file);

        sink.write_batch(&[sample_document("2")]).await.unwrap();
        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        assert!(content.starts_with(&before));
        assert_eq!(content.lines().count(), 2);
        assert!(content
            .lines()
            .all(|l| serde_json::from_str::<serde_json::Value>(l).is_ok()));
    }

    #[tokio::test]
    async fn test_unwritable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let sink = JsonlSink::new(dir.path());
        let result = sink.write_batch(&[sample_document("1")]).await;
        assert!(matches!(result, Err(SinkError::Unavailable { .. })));
    }
}
