// error_handling.rs - Error taxonomy shared by the generator, codec and queries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error(
        "Invalid maze geometry: {width}x{height} (dimensions must be between 1 and {max})",
        max = crate::maze::MAX_DIMENSION
    )]
    InvalidGeometry { width: i32, height: i32 },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Corrupt tree document: {reason}")]
    Corrupt { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExplorerError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        ExplorerError::Corrupt {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ExplorerError::NotFound { what: what.into() }
    }

    /// Map a read-side I/O failure: a missing file is `NotFound`, anything
    /// else means the document could not be trusted.
    pub fn from_read(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(format!("file {}", path.display()))
        } else {
            Self::corrupt(format!("failed to read {}: {}", path.display(), err))
        }
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
