use engine_config::hooks::HookPhase;
use engine_core::error::{ClientError, PoolError, SourceError};
use engine_processing::error::ReadError;
use thiserror::Error;

/// Errors raised by the import manager.
///
/// Every variant names the graph it happened on so it can be logged as is.
/// The type is `Clone` because a single stop result is handed to every
/// caller of `Manager::stop`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManagerError {
    #[error("[{graph}] Failed to open source '{source_name}': {error}")]
    OpenSource {
        graph: String,
        source_name: String,
        #[source]
        error: SourceError,
    },

    #[error("[{graph}] Failed to size source '{source_name}': {error}")]
    SourceSize {
        graph: String,
        source_name: String,
        #[source]
        error: SourceError,
    },

    /// The reader pool refused the job, usually because the manager stopped.
    #[error("[{graph}] Failed to submit job for source '{source_name}': {error}")]
    Submit {
        graph: String,
        source_name: String,
        #[source]
        error: PoolError,
    },

    #[error("[{graph}] Failed to read from source '{source_name}': {error}")]
    ReadBatch {
        graph: String,
        source_name: String,
        #[source]
        error: ReadError,
    },

    #[error("[{graph}] {phase} hook failed on statement '{statement}': {message}")]
    Hook {
        graph: String,
        phase: HookPhase,
        statement: String,
        message: String,
    },

    #[error("[{graph}] Client pool error: {error}")]
    ClientPool {
        graph: String,
        #[source]
        error: ClientError,
    },

    #[error("[{graph}] Manager already stopped")]
    Stopped { graph: String },

    /// A job task panicked or was cancelled.
    #[error("[{graph}] Job task failed: {message}")]
    Task { graph: String, message: String },
}
