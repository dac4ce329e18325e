use engine_core::error::{BuildError, ClientError, SourceError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Record has {actual} fields, expected {expected}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Conversion failed: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    /// Bad record that should be skipped; reading goes on.
    #[error("Skipping record: {reason}")]
    Continue { bytes: usize, reason: String },

    #[error("End of stream")]
    Eof,

    #[error("Read failed on source '{source_name}': {message}")]
    Io {
        source_name: String,
        message: String,
    },

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Reader task aborted: {0}")]
    Aborted(String),
}

impl ReadError {
    pub fn is_eof(&self) -> bool {
        matches!(self, ReadError::Eof)
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, ReadError::Continue { .. })
    }
}

/// Failure importing one sub-batch, with the statement for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Failed to build statement for {records} records: {source}")]
    Build {
        records: usize,
        #[source]
        source: BuildError,
    },

    #[error("Statement failed after {attempts} attempts: {source}; statement: {statement}")]
    Execute {
        statement: String,
        attempts: usize,
        #[source]
        source: ClientError,
    },
}

impl ImportError {
    pub fn statement(&self) -> Option<&str> {
        match self {
            ImportError::Execute { statement, .. } => Some(statement),
            ImportError::Build { .. } => None,
        }
    }
}
