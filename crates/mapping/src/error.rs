use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid override table: {0}")]
    InvalidOverrides(String),
}
