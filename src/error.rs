use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid CSV header: {message}")]
    Schema { message: String },

    #[error("Invalid {field} in row {row}: {message}")]
    InvalidField {
        row: usize,
        field: &'static str,
        message: String,
    },

    #[error("Insert failed at row {row}: {source}")]
    RowInsert { row: usize, source: sqlx::Error },

    #[error("Database transaction failed: {0}")]
    Transaction(sqlx::Error),

    #[error("Summary query failed for {email}: {message}")]
    Query { email: String, message: String },

    #[error("Source {location} unavailable: {source}")]
    SourceUnavailable {
        location: String,
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
