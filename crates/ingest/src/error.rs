use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Row not parseable as a record, or a mapped value that cannot be
    /// converted to its unified column kind.
    #[error("line {line}: malformed row: {message}")]
    MalformedRow { line: usize, message: String },

    /// `event_ts` or `event_type` resolved to empty after mapping.
    #[error("line {line}: missing required field: {field}")]
    MissingRequiredField { line: usize, field: &'static str },

    #[error("mapping error: {0}")]
    Mapper(#[from] casetrail_mapper::MapperError),

    /// Store-level failures, including the duplicate-file guard and
    /// schema write errors. Always fatal to the run.
    #[error("store error: {0}")]
    Store(#[from] casetrail_store::StoreError),
}

impl IngestError {
    /// Row-scoped errors are recoverable in lenient mode; everything
    /// else aborts the run regardless of mode.
    #[must_use]
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            IngestError::MalformedRow { .. } | IngestError::MissingRequiredField { .. }
        )
    }

    /// Source line for row-scoped errors.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            IngestError::MalformedRow { line, .. }
            | IngestError::MissingRequiredField { line, .. } => Some(*line),
            _ => None,
        }
    }
}
