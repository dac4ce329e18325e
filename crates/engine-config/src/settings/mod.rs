use crate::hooks::{HookPhase, Hooks};
use error::SettingsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub mod error;

pub const DEFAULT_BATCH: usize = 128;
pub const DEFAULT_READER_CONCURRENCY: usize = 50;
pub const DEFAULT_IMPORTER_CONCURRENCY: usize = 512;
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Manager section of an import config, as written by users.
///
/// Missing or zero values fall back to the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub graph_name: String,
    #[serde(default)]
    pub batch: Option<usize>,
    #[serde(default)]
    pub reader_concurrency: Option<usize>,
    #[serde(default)]
    pub importer_concurrency: Option<usize>,
    #[serde(default)]
    pub stats_interval_ms: Option<u64>,
    #[serde(default)]
    pub hooks: Hooks,
}

/// Immutable, validated configuration the manager is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    pub graph_name: String,
    /// Records per batch; also the default sub-batch size per importer.
    pub batch: usize,
    pub reader_concurrency: usize,
    pub importer_concurrency: usize,
    /// `None` disables periodic stats logging.
    pub stats_interval: Option<Duration>,
    pub hooks: Hooks,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            graph_name: String::new(),
            batch: DEFAULT_BATCH,
            reader_concurrency: DEFAULT_READER_CONCURRENCY,
            importer_concurrency: DEFAULT_IMPORTER_CONCURRENCY,
            stats_interval: Some(DEFAULT_STATS_INTERVAL),
            hooks: Hooks::default(),
        }
    }
}

impl ManagerConfig {
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(self) -> Result<ManagerSettings, SettingsError> {
        if self.graph_name.trim().is_empty() {
            return Err(SettingsError::MissingGraphName);
        }

        for phase in [HookPhase::Before, HookPhase::After] {
            for (index, hook) in self.hooks.phase(phase).iter().enumerate() {
                let has_statement = hook.statements.iter().any(|s| !s.trim().is_empty());
                if !has_statement && hook.wait.is_zero() {
                    warn!(phase = %phase, index, "Hook has no statements and no wait, it does nothing");
                }
            }
        }

        let stats_interval = match self.stats_interval_ms {
            None => Some(DEFAULT_STATS_INTERVAL),
            Some(0) => {
                warn!("Stats interval is 0, periodic stats logging disabled");
                None
            }
            Some(ms) => Some(Duration::from_millis(ms)),
        };

        Ok(ManagerSettings {
            graph_name: self.graph_name,
            batch: positive_or(self.batch, DEFAULT_BATCH),
            reader_concurrency: positive_or(self.reader_concurrency, DEFAULT_READER_CONCURRENCY),
            importer_concurrency: positive_or(
                self.importer_concurrency,
                DEFAULT_IMPORTER_CONCURRENCY,
            ),
            stats_interval,
            hooks: self.hooks,
        })
    }
}

fn positive_or(value: Option<usize>, default: usize) -> usize {
    value.filter(|v| *v > 0).unwrap_or(default)
}
