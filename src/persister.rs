use crate::error::PipelineError;
use crate::store::TransactionWriter;
use crate::transaction::{CsvRow, TransactionRecord};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Persister {
    writer: Arc<dyn TransactionWriter>,
}

impl Persister {
    pub fn new(writer: Arc<dyn TransactionWriter>) -> Self {
        Self { writer }
    }

    pub async fn persist(&self, rows: &[CsvRow]) -> Result<BTreeSet<String>, PipelineError> {
        let records = match parse_rows(rows) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Rejecting transaction batch");
                return Err(e);
            }
        };

        if records.is_empty() {
            return Ok(BTreeSet::new());
        }

        self.writer.insert_batch(&records).await?;

        let emails: BTreeSet<String> = records.iter().map(|r| r.email.clone()).collect();
        info!(
            rows = records.len(),
            accounts = emails.len(),
            "Committed transaction batch"
        );
        Ok(emails)
    }
}

fn parse_rows(rows: &[CsvRow]) -> Result<Vec<TransactionRecord>, PipelineError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| row.parse(index + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryWriter {
        batches: Mutex<Vec<Vec<TransactionRecord>>>,
    }

    #[async_trait]
    impl TransactionWriter for MemoryWriter {
        async fn insert_batch(&self, records: &[TransactionRecord]) -> Result<(), PipelineError> {
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl TransactionWriter for FailingWriter {
        async fn insert_batch(&self, _: &[TransactionRecord]) -> Result<(), PipelineError> {
            Err(PipelineError::Transaction(sqlx::Error::PoolClosed))
        }
    }

    fn rows() -> Vec<CsvRow> {
        vec![
            CsvRow::new("1", "2024-01-10", "+30.00", "ana@example.com"),
            CsvRow::new("2", "2024-01-12", "-15.00", "bob@example.com"),
            CsvRow::new("3", "2024-02-01", "+20.00", "ana@example.com"),
        ]
    }

    #[tokio::test]
    async fn test_persist_returns_distinct_emails() {
        let writer = Arc::new(MemoryWriter::default());
        let persister = Persister::new(writer.clone());

        let emails = persister.persist(&rows()).await.unwrap();

        assert_eq!(
            emails.into_iter().collect::<Vec<_>>(),
            vec!["ana@example.com", "bob@example.com"]
        );
        let batches = writer.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_id_writes_nothing() {
        let writer = Arc::new(MemoryWriter::default());
        let persister = Persister::new(writer.clone());

        let mut rows = rows();
        rows.push(CsvRow::new("x4", "2024-02-02", "+1.00", "ana@example.com"));

        match persister.persist(&rows).await {
            Err(PipelineError::InvalidField { row, field, .. }) => {
                assert_eq!(row, 4);
                assert_eq!(field, "id");
            }
            other => panic!("Expected InvalidField error, got {:?}", other),
        }
        assert!(writer.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_an_error() {
        let writer = Arc::new(MemoryWriter::default());
        let persister = Persister::new(writer.clone());

        assert!(persister.persist(&[]).await.unwrap().is_empty());
        assert!(writer.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writer_failure_propagates() {
        let persister = Persister::new(Arc::new(FailingWriter));

        assert!(matches!(
            persister.persist(&rows()).await,
            Err(PipelineError::Transaction(_))
        ));
    }
}
