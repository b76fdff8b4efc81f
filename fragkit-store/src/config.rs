use crate::StoreResult;
use fragkit_cache::DEFAULT_LID_PREFIX;
use serde::{Deserialize, Serialize};

/// What happens to a fragment instance that leaves its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetachedFragmentPolicy {
    /// Tear the instance down as soon as its field is set to null or it is
    /// displaced. Its cached attributes survive, so a rollback
    /// materializes a fresh instance.
    #[default]
    Teardown,
    /// Keep the instance alive. A rollback of a null assignment returns the
    /// same instance; displaced instances are torn down with their owner.
    Retain,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix for generated local ids.
    pub lid_prefix: String,
    pub detached_fragments: DetachedFragmentPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lid_prefix: DEFAULT_LID_PREFIX.to_string(),
            detached_fragments: DetachedFragmentPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Parses a JSON config document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
