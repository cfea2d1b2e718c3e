use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("store error: {0}")]
    Store(#[from] casetrail_store::StoreError),

    #[error("seed entity not found: {entity_type}:{entity_value}")]
    SeedNotFound {
        entity_type: String,
        entity_value: String,
    },
}
