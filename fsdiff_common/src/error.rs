use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported entry at {path}: {detail}")]
    UnsupportedEntry { path: String, detail: String },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("path error: {0}")]
    Path(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FsdiffError>;
