//! Machine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid machine configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime settings for a machine.
///
/// Missing fields take their defaults when deserialized.
///
/// # Example
///
/// ```rust
/// use hsm_engine::MachineConfig;
///
/// let config = MachineConfig::from_json(r#"{ "queue_reentrant": false }"#).unwrap();
/// assert!(!config.queue_reentrant);
/// assert_eq!(config.history_limit, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Queue causes emitted while a dispatch is running instead of
    /// rejecting them as busy.
    pub queue_reentrant: bool,
    /// Maximum number of transition records kept in the history.
    pub history_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            queue_reentrant: true,
            history_limit: 64,
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn queue_reentrant(mut self, queue: bool) -> Self {
        self.queue_reentrant = queue;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = MachineConfig::from_json("{}").unwrap();
        assert_eq!(config, MachineConfig::default());
    }

    #[test]
    fn malformed_json_is_reported() {
        let result = MachineConfig::from_json("{ queue_reentrant: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn setters_chain() {
        let config = MachineConfig::default()
            .queue_reentrant(false)
            .history_limit(0);
        assert!(!config.queue_reentrant);
        assert_eq!(config.history_limit, 0);
    }
}
