use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabtrackError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LabtrackError>;
