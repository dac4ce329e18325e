pub mod connectors;
pub mod error;
pub mod pool;
pub mod retry;
pub mod statement;
pub mod stats;
pub mod sync;
