pub mod error;
pub mod importer;
pub mod reader;
