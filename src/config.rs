//! Every field has a default, so a partial TOML file is enough.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::{BuildParams, DEFAULT_MAX_BUDGET, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_BUDGET};
use crate::cache::MAX_TTL;
use crate::model::entity::Price;
use crate::repository::DEFAULT_DRAFT_PRICE_CAP;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Price,
    pub max: Price,
}

impl PriceRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Price {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self { min: 750, max: 950 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub total_samples: usize,

    /// Concurrent tasks per round; bounds load on the player database
    pub batch_size: usize,

    pub min_budget: Price,
    pub max_budget: Price,

    /// Targets drawn by the cost-variation run
    pub value_sampler_range: PriceRange,

    /// Fixed target for the distribution run
    pub target_value: Price,

    pub max_iterations: usize,

    pub cache_ttl_secs: u64,

    pub draft_price_cap: Price,

    /// Run seed; a random one is drawn when absent
    pub seed: Option<u64>,

    pub database_path: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_samples: 1000,
            batch_size: 100,
            min_budget: DEFAULT_MIN_BUDGET,
            max_budget: DEFAULT_MAX_BUDGET,
            value_sampler_range: PriceRange::default(),
            target_value: 950,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cache_ttl_secs: 60 * 60,
            draft_price_cap: DEFAULT_DRAFT_PRICE_CAP,
            seed: None,
            database_path: PathBuf::from("fpl.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("batch_size must be at least 1")]
    EmptyBatch,
    #[error("min_budget {min} exceeds max_budget {max}")]
    InvertedBudget { min: Price, max: Price },
    #[error("value range {min}..={max} is not inside the budget window {lo}..={hi}")]
    RangeOutsideBudget { min: Price, max: Price, lo: Price, hi: Price },
    #[error("target_value {target} is not inside the budget window {lo}..={hi}")]
    TargetOutsideBudget { target: Price, lo: Price, hi: Price },
    #[error("max_iterations must be at least 1")]
    NoIterations,
    #[error("cache_ttl_secs {secs} exceeds the {max}s limit")]
    TtlTooLong { secs: u64, max: u64 },
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (lo, hi) = (self.min_budget, self.max_budget);
        if self.batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if self.cache_ttl_secs > MAX_TTL.as_secs() {
            return Err(ConfigError::TtlTooLong { secs: self.cache_ttl_secs, max: MAX_TTL.as_secs() });
        }
        if lo > hi {
            return Err(ConfigError::InvertedBudget { min: lo, max: hi });
        }
        let PriceRange { min, max } = self.value_sampler_range;
        if min > max || min < lo || max > hi {
            return Err(ConfigError::RangeOutsideBudget { min, max, lo, hi });
        }
        if !(lo..=hi).contains(&self.target_value) {
            return Err(ConfigError::TargetOutsideBudget { target: self.target_value, lo, hi });
        }
        Ok(())
    }

    pub fn build_params(&self) -> BuildParams {
        BuildParams {
            min_budget: self.min_budget,
            max_budget: self.max_budget,
            max_iterations: self.max_iterations,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "total_samples = 200\nbatch_size = 50\nseed = 9\n\n[value_sampler_range]\nmin = 800\nmax = 900"
        )
        .unwrap();

        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(config.total_samples, 200);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.value_sampler_range, PriceRange { min: 800, max: 900 });
        assert_eq!(config.max_budget, DEFAULT_MAX_BUDGET);
    }

    #[test]
    fn rejects_range_outside_budget() {
        let config = SimulationConfig {
            value_sampler_range: PriceRange { min: 700, max: 950 },
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::RangeOutsideBudget { .. })));

        let config = SimulationConfig { batch_size: 0, ..SimulationConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptyBatch));
    }

    #[test]
    fn rejects_unbounded_cache_ttl() {
        let config = SimulationConfig { cache_ttl_secs: u64::MAX, ..SimulationConfig::default() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TtlTooLong { secs: u64::MAX, max: MAX_TTL.as_secs() })
        );

        let config = SimulationConfig { cache_ttl_secs: MAX_TTL.as_secs(), ..SimulationConfig::default() };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_budget = 1100").unwrap();
        assert!(SimulationConfig::load(file.path()).is_err());
    }

    #[test]
    fn range_sampling_stays_in_bounds() {
        let range = PriceRange { min: 800, max: 810 };
        let mut rng = rand::thread_rng();
        assert!((0..100).map(|_| range.sample(&mut rng)).all(|p| (800..=810).contains(&p)));
    }
}
