use crate::config::Config;
use crate::error::PipelineError;
use crate::transaction::{Amount, TransactionRecord, DATE_FORMAT};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id            INTEGER PRIMARY KEY,
    date          TEXT NOT NULL,
    "transaction" TEXT NOT NULL,
    email         TEXT NOT NULL
)
"#;

const CREATE_EMAIL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_email ON transactions (email)";

const INSERT: &str = r#"INSERT INTO transactions (id, date, "transaction", email) VALUES (?, ?, ?, ?)"#;

const SELECT_BY_EMAIL: &str = r#"
SELECT id, date, "transaction", email
FROM transactions
WHERE email = ?
ORDER BY date, id
"#;

#[async_trait]
pub trait TransactionWriter: Send + Sync {
    async fn insert_batch(&self, records: &[TransactionRecord]) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait TransactionReader: Send + Sync {
    async fn records_for_email(&self, email: &str)
        -> Result<Vec<TransactionRecord>, PipelineError>;
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(config: &Config) -> Result<Self, PipelineError> {
        let options =
            SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
        Self::connect_with(options, config.max_connections).await
    }

    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect_with(options, max_connections).await
    }

    async fn connect_with(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, PipelineError> {
        info!(max_connections, "Connecting to transaction store");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), PipelineError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_EMAIL_INDEX).execute(&self.pool).await?;
        debug!("Transaction store schema ready");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, PipelineError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TransactionWriter for Store {
    async fn insert_batch(&self, records: &[TransactionRecord]) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::Transaction)?;

        for (index, record) in records.iter().enumerate() {
            let result = sqlx::query(INSERT)
                .bind(record.external_id)
                .bind(record.date.format(DATE_FORMAT).to_string())
                .bind(record.amount.to_string())
                .bind(record.email.as_str())
                .execute(&mut *tx)
                .await;

            if let Err(source) = result {
                let row = index + 1;
                warn!(row, error = %source, "Rolling back transaction batch");
                if let Err(e) = tx.rollback().await {
                    error!(row, error = %e, "Rollback failed");
                }
                return Err(PipelineError::RowInsert { row, source });
            }
        }

        tx.commit().await.map_err(PipelineError::Transaction)?;
        Ok(())
    }
}

#[async_trait]
impl TransactionReader for Store {
    async fn records_for_email(
        &self,
        email: &str,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String)>(SELECT_BY_EMAIL)
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::Query {
                email: email.to_string(),
                message: e.to_string(),
            })?;

        rows.into_iter()
            .map(|(id, date, amount, owner)| -> Result<TransactionRecord, PipelineError> {
                let corrupt = |message: String| PipelineError::Query {
                    email: email.to_string(),
                    message: format!("stored transaction {}: {}", id, message),
                };
                let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .map_err(|e| corrupt(format!("bad date '{}': {}", date, e)))?;
                let amount = amount.parse::<Amount>().map_err(corrupt)?;
                Ok(TransactionRecord {
                    external_id: id,
                    date,
                    amount,
                    email: owner,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store(dir: &TempDir) -> Store {
        let store = Store::open(&dir.path().join("test.db"), 2).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn record(id: i64, date: &str, amount: &str, email: &str) -> TransactionRecord {
        TransactionRecord::new(
            id,
            NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            amount.parse().unwrap(),
            email,
        )
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        let records = vec![
            record(2, "2024-02-01", "+20.00", "ana@example.com"),
            record(1, "2024-01-10", "-15.50", "ana@example.com"),
            record(3, "2024-01-11", "+1.00", "bob@example.com"),
        ];
        store.insert_batch(&records).await.unwrap();

        let ana = store.records_for_email("ana@example.com").await.unwrap();
        assert_eq!(ana, vec![records[1].clone(), records[0].clone()]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_id_rolls_back_whole_batch() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        let records = vec![
            record(1, "2024-01-10", "+10.00", "ana@example.com"),
            record(2, "2024-01-11", "+10.00", "ana@example.com"),
            record(1, "2024-01-12", "+10.00", "ana@example.com"),
        ];

        match store.insert_batch(&records).await {
            Err(PipelineError::RowInsert { row, .. }) => assert_eq!(row, 3),
            other => panic!("Expected RowInsert error, got {:?}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;
        store.migrate().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_email_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;
        assert!(store
            .records_for_email("nobody@example.com")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_amount_is_a_query_error() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        sqlx::query(INSERT)
            .bind(9_i64)
            .bind("2024-01-10")
            .bind("30.00")
            .bind("ana@example.com")
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.records_for_email("ana@example.com").await,
            Err(PipelineError::Query { .. })
        ));
    }
}
