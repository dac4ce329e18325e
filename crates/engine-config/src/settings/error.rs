use thiserror::Error;

/// Errors raised while loading or validating manager configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to parse manager config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Graph name is required")]
    MissingGraphName,
}
