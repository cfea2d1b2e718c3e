use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("required unified fields unmapped: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("unknown unified field: {0}")]
    UnknownField(String),
}
