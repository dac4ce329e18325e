use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Failed to open source '{name}': {message}")]
    Open { name: String, message: String },

    #[error("Failed to size source '{name}': {message}")]
    Size { name: String, message: String },

    #[error("Failed to query source '{name}': {message}")]
    Query { name: String, message: String },

    #[error("Failed to close source '{name}': {message}")]
    Close { name: String, message: String },

    #[error("Source '{0}' is not open")]
    NotOpen(String),

    #[error("Invalid source config: {0}")]
    InvalidConfig(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Client pool is not open")]
    PoolNotOpen,

    #[error("Failed to open client pool: {0}")]
    Open(String),

    #[error("Failed to acquire client: {0}")]
    Acquire(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server rejected statement: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Record {index} has {actual} fields, expected at least {expected}")]
    MissingField {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to build statement: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("Worker pool '{0}' is closed")]
    Closed(String),
}
