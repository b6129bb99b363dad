use std::path::PathBuf;
use thiserror::Error;

/// Result type for taxonomy loading
pub type Result<T> = std::result::Result<T, TaxonomyError>;

/// Errors that stop a taxonomy from being loaded at all
#[derive(Error, Debug)]
pub enum TaxonomyError {
    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An authoritative input file does not exist
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// The file was read but no row survived validation
    #[error("No usable rows in {input}: {skipped} of {read} rows skipped")]
    EmptyInput {
        input: String,
        read: usize,
        skipped: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TaxonomyError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
