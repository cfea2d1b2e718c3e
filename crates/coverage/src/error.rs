use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoverageError>;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("store error: {0}")]
    Store(#[from] casetrail_store::StoreError),

    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("bucket_minutes must be positive")]
    InvalidBucketSize,
}
