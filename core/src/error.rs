use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed row in {table} (id {row_id}): {detail}")]
    MalformedRow {
        table: String,
        row_id: String,
        detail: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    pub fn malformed(table: &str, row_id: &str, detail: impl Into<String>) -> Self {
        Self::MalformedRow {
            table: table.to_string(),
            row_id: row_id.to_string(),
            detail: detail.into(),
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;
