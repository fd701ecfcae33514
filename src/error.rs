use metadump_api_types::Ino;
use metadump_tools::escape::EscapeError;

/// Errors of the dump and load operations.
///
/// All of them abort the running operation. Partially written output must be
/// considered invalid.
#[derive(thiserror::Error, Debug)]
pub enum DumpError {
    #[error("{0}")]
    Encoding(#[from] EscapeError),
    #[error("unable to decode attribute - {0}")]
    Decode(String),
    #[error("{0}")]
    Structural(String),
    #[error("inode conflict: {0}")]
    Conflict(Ino),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
