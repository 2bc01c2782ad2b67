use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{MoiraError, Result};

/// Tunables for FATE stores and table operations.
///
/// Every field has a default, so a partial configuration deserializes into a
/// complete one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MoiraConfig {
    /// Most steps a transaction's stack may hold.
    pub max_repos: u32,
    /// Upper bound on a wait hint returned by a table operation.
    pub max_wait_hint_ms: u64,
    /// Lower bound on a non-zero wait hint.
    pub min_wait_hint_ms: u64,
    /// Total time a readiness poller keeps retrying before giving up.
    pub readiness_timeout_ms: u64,
    /// Longest single sleep of a readiness poller.
    pub readiness_max_delay_ms: u64,
}

impl Default for MoiraConfig {
    fn default() -> Self {
        Self {
            max_repos: 100,
            max_wait_hint_ms: 30_000,
            min_wait_hint_ms: 1,
            readiness_timeout_ms: 300_000,
            readiness_max_delay_ms: 30_000,
        }
    }
}

impl MoiraConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_repos == 0 {
            return Err(MoiraError::Other("max_repos must be positive".into()));
        }
        if self.min_wait_hint_ms == 0 || self.min_wait_hint_ms > self.max_wait_hint_ms {
            return Err(MoiraError::Other(format!(
                "wait hint bounds must satisfy 0 < min ({}) <= max ({})",
                self.min_wait_hint_ms, self.max_wait_hint_ms
            )));
        }
        if self.readiness_max_delay_ms == 0 {
            return Err(MoiraError::Other("readiness_max_delay_ms must be positive".into()));
        }
        Ok(())
    }

    /// Clamps the duration of a batch pass into a non-zero wait hint.
    pub fn wait_hint(&self, elapsed: Duration) -> u64 {
        let elapsed_ms = elapsed.as_millis().min(u64::MAX as u128) as u64;
        elapsed_ms.max(self.min_wait_hint_ms).min(self.max_wait_hint_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn readiness_max_delay(&self) -> Duration {
        Duration::from_millis(self.readiness_max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_hint_is_clamped() {
        let config = MoiraConfig::default();
        assert_eq!(config.wait_hint(Duration::ZERO), 1);
        assert_eq!(config.wait_hint(Duration::from_millis(250)), 250);
        assert_eq!(config.wait_hint(Duration::from_secs(120)), 30_000);
    }

    #[test]
    fn validation_rejects_inverted_bounds() {
        let config = MoiraConfig {
            min_wait_hint_ms: 10,
            max_wait_hint_ms: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(MoiraConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        use serde::de::value::{Error as ValueError, MapDeserializer};

        let entries = vec![("readiness_timeout_ms", 5_000u64), ("max_wait_hint_ms", 10_000u64)];
        let de: MapDeserializer<'_, _, ValueError> = MapDeserializer::new(entries.into_iter());
        let config = MoiraConfig::deserialize(de).unwrap();

        assert_eq!(config.readiness_timeout_ms, 5_000);
        assert_eq!(config.max_wait_hint_ms, 10_000);
        assert_eq!(config.max_repos, 100);
        assert_eq!(config.min_wait_hint_ms, 1);
        assert_eq!(config.readiness_max_delay_ms, 30_000);
        assert!(config.validate().is_ok());
    }
}
