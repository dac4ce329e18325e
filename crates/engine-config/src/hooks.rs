use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// When a hook list runs relative to the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
    Before,
    After,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Before => "before",
            HookPhase::After => "after",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statements executed in order, followed by an optional pause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default)]
    pub statements: Vec<String>,
    #[serde(default, rename = "wait_ms", with = "duration_ms")]
    pub wait: Duration,
}

impl Hook {
    pub fn new<S: Into<String>>(statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
            wait: Duration::ZERO,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<Hook>,
}

impl Hooks {
    pub fn phase(&self, phase: HookPhase) -> &[Hook] {
        match phase {
            HookPhase::Before => &self.before,
            HookPhase::After => &self.after,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hook_lists() {
        let hooks: Hooks = serde_json::from_str(
            r#"{
                "before": [
                    { "statements": ["CREATE SPACE IF NOT EXISTS g(vid_type=INT64)"], "wait_ms": 10000 },
                    { "statements": ["USE g", "CREATE TAG IF NOT EXISTS person(name string)"] }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(hooks.before.len(), 2);
        assert_eq!(hooks.before[0].wait, Duration::from_secs(10));
        assert_eq!(hooks.before[1].wait, Duration::ZERO);
        assert_eq!(hooks.phase(HookPhase::Before)[1].statements.len(), 2);
        assert!(hooks.phase(HookPhase::After).is_empty());
    }

    #[test]
    fn phase_names() {
        assert_eq!(HookPhase::Before.to_string(), "before");
        assert_eq!(HookPhase::After.as_str(), "after");
    }
}
