use crate::error::ClientError;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of one statement execution as reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    succeeded: bool,
    error: Option<String>,
    latency: Duration,
    resp_time: Duration,
}

impl Response {
    pub fn success(latency: Duration, resp_time: Duration) -> Self {
        Self {
            succeeded: true,
            error: None,
            latency,
            resp_time,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_succeed(&self) -> bool {
        self.succeeded
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Server-side round trip.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Full response time including client-side overhead.
    pub fn resp_time(&self) -> Duration {
        self.resp_time
    }
}

/// Options applied when checking a dedicated client out of the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOptions {
    /// Graph (space) the session should switch to, if any.
    pub graph: Option<String>,
}

/// A single dedicated session.
#[async_trait]
pub trait Client: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<Response, ClientError>;

    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Connection pool shared by every importer task and hook phase.
///
/// Implementations must be safe for concurrent use; the engine does not
/// lock around any of these calls.
#[async_trait]
pub trait ClientPool: Send + Sync {
    async fn open(&self) -> Result<(), ClientError>;

    async fn close(&self) -> Result<(), ClientError>;

    async fn execute(&self, statement: &str) -> Result<Response, ClientError>;

    async fn get_client(&self, options: &ClientOptions) -> Result<Box<dyn Client>, ClientError>;
}
