//! Event key generation
//!
//! Keys model which "thing" an event asks for, so cache-like stages see a
//! realistic hit pattern. The default draws from a normal distribution over
//! the keyspace, rounded and clamped at zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use crate::error::SimError;
use crate::types::EventKey;
use crate::SimulationConfig;

/// Source of event keys.
pub trait KeyGenerator {
    fn next_key(&mut self) -> EventKey;
}

/// Normally distributed keys, seeded for reproducible runs.
pub struct NormalKeyspace {
    mean: f64,
    std: f64,
    rng: StdRng,
    dist: Normal<f64>,
}

impl NormalKeyspace {
    pub fn new(mean: f64, std: f64, seed: u64) -> Result<Self, SimError> {
        let dist = Normal::new(mean, std).map_err(|e| {
            SimError::Configuration(format!("invalid keyspace (mean {mean}, std {std}): {e}"))
        })?;
        Ok(Self {
            mean,
            std,
            rng: StdRng::seed_from_u64(seed),
            dist,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimError> {
        Self::new(config.keyspace_mean, config.keyspace_std, config.seed)
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

impl KeyGenerator for NormalKeyspace {
    fn next_key(&mut self) -> EventKey {
        let sample: f64 = self.rng.sample(self.dist);
        EventKey(sample.round().max(0.0) as u64)
    }
}

/// Every event gets the same key.
#[derive(Debug, Clone, Copy)]
pub struct FixedKey(pub EventKey);

impl KeyGenerator for FixedKey {
    fn next_key(&mut self) -> EventKey {
        self.0
    }
}
