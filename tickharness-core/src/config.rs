//! Run configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SimError;

/// Options recognised by a [`Simulation`](crate::Simulation).
///
/// The number of events is not part of the configuration; it is passed to
/// each [`Simulation::run`](crate::Simulation::run) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Arrival rate, in events per 1000 ticks.
    pub events_per_1000_ticks: f64,
    /// Mean of the event key distribution.
    pub keyspace_mean: f64,
    /// Standard deviation of the event key distribution.
    pub keyspace_std: f64,
    /// Seed for key generation.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            events_per_1000_ticks: 1000.0,
            keyspace_mean: 10_000.0,
            keyspace_std: 2_000.0,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn with_rate(mut self, events_per_1000_ticks: f64) -> Self {
        self.events_per_1000_ticks = events_per_1000_ticks;
        self
    }

    pub fn with_keyspace(mut self, mean: f64, std: f64) -> Self {
        self.keyspace_mean = mean;
        self.keyspace_std = std;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse a JSON document; absent fields keep their defaults.
    ///
    /// ```
    /// # use tickharness_core::SimulationConfig;
    /// let config = SimulationConfig::from_json_str(r#"{ "eventsPer1000Ticks": 2000 }"#).unwrap();
    /// assert_eq!(config.events_per_1000_ticks, 2000.0);
    /// assert_eq!(config.seed, 42);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(?config, "Loaded simulation config");
        Ok(config)
    }

    /// Reject configurations no run could honour.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.events_per_1000_ticks.is_finite() || self.events_per_1000_ticks <= 0.0 {
            return Err(SimError::Configuration(format!(
                "events_per_1000_ticks must be a positive number, got {}",
                self.events_per_1000_ticks
            )));
        }
        if !self.keyspace_mean.is_finite() {
            return Err(SimError::Configuration(format!(
                "keyspace_mean must be finite, got {}",
                self.keyspace_mean
            )));
        }
        if !self.keyspace_std.is_finite() || self.keyspace_std < 0.0 {
            return Err(SimError::Configuration(format!(
                "keyspace_std must be finite and non-negative, got {}",
                self.keyspace_std
            )));
        }
        Ok(())
    }

    /// Ticks between successive arrivals at the configured rate.
    pub fn tick_delta(&self) -> f64 {
        1000.0 / self.events_per_1000_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_delta(), 1.0);
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = SimulationConfig::default().with_rate(rate).validate().unwrap_err();
            assert!(matches!(err, SimError::Configuration(_)), "rate {rate}");
        }
    }

    #[test]
    fn test_rejects_bad_keyspace() {
        let config = SimulationConfig::default().with_keyspace(100.0, -1.0);
        assert!(config.validate().is_err());
        let config = SimulationConfig::default().with_keyspace(f64::NAN, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SimulationConfig::from_json_str(
            r#"{ "eventsPer1000Ticks": 250, "keyspaceMean": 50, "keyspaceStd": 5 }"#,
        )
        .unwrap();
        assert_eq!(config.events_per_1000_ticks, 250.0);
        assert_eq!(config.keyspace_mean, 50.0);
        assert_eq!(config.keyspace_std, 5.0);
        assert_eq!(config.seed, 42);
        assert_eq!(config.tick_delta(), 4.0);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            SimulationConfig::from_json_str(r#"{ "eventsPer1000Ticks": 0 }"#),
            Err(SimError::Configuration(_))
        ));
        assert!(matches!(
            SimulationConfig::from_json_str("not json"),
            Err(SimError::Json(_))
        ));
    }
}
