use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("case not initialized: {0}")]
    CaseNotFound(String),

    #[error("unknown run_id: {0}")]
    RunNotFound(String),

    #[error(
        "duplicate file: already registered as run {run_id} (query: {query_name})"
    )]
    DuplicateFile { run_id: String, query_name: String },

    #[error("{0}")]
    Other(String),
}
