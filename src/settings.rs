use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::collect::CollectOptions;
use crate::source::dbpedia::SPARQL_ENDPOINT;
use crate::source::wikipedia::RANDOM_PAGE_URL;

pub const ENV_PREFIX: &str = "HARVEST";

/// Run settings: built-in defaults, then `HARVEST_*` environment variables,
/// then command-line flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Total fetch attempts.
    pub iterations: usize,
    /// Pause length in seconds.
    pub wait_time: f64,
    /// Iterations between pauses.
    pub wait_period: usize,
    pub random_url: String,
    pub sparql_endpoint: String,
    pub timeout_secs: u64,
}

/// Flag values that override everything else when present.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub iterations: Option<usize>,
    pub wait_time: Option<f64>,
    pub wait_period: Option<usize>,
}

impl Settings {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_from(Environment::with_prefix(ENV_PREFIX).try_parsing(true), overrides)
    }

    fn load_from(env: Environment, overrides: &Overrides) -> Result<Self> {
        let settings = Config::builder()
            .set_default("iterations", 10_000_i64)?
            .set_default("wait_time", 0.5)?
            .set_default("wait_period", 20_i64)?
            .set_default("random_url", RANDOM_PAGE_URL)?
            .set_default("sparql_endpoint", SPARQL_ENDPOINT)?
            .set_default("timeout_secs", 30_i64)?
            .add_source(env)
            .set_override_option("iterations", overrides.iterations.map(|n| n as i64))?
            .set_override_option("wait_time", overrides.wait_time)?
            .set_override_option("wait_period", overrides.wait_period.map(|n| n as i64))?
            .build()
            .context("Failed to read settings")?;

        settings
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn collect_options(&self) -> Result<CollectOptions> {
        let wait_time = Duration::try_from_secs_f64(self.wait_time)
            .with_context(|| format!("wait_time must be a non-negative number, got {}", self.wait_time))?;
        Ok(CollectOptions {
            iterations: self.iterations,
            wait_time,
            wait_period: self.wait_period,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn defaults() {
        let s = Settings::load_from(env(&[]), &Overrides::default()).unwrap();
        assert_eq!(s.iterations, 10_000);
        assert_eq!(s.wait_period, 20);
        assert_eq!(s.wait_time, 0.5);
        assert_eq!(s.random_url, RANDOM_PAGE_URL);
        assert_eq!(s.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn flags_beat_environment() {
        let vars = [("HARVEST_ITERATIONS", "50"), ("HARVEST_WAIT_PERIOD", "5")];
        let overrides = Overrides { iterations: Some(7), ..Default::default() };

        let s = Settings::load_from(env(&vars), &overrides).unwrap();
        assert_eq!(s.iterations, 7);
        assert_eq!(s.wait_period, 5);
    }

    #[test]
    fn negative_wait_time_is_rejected() {
        let overrides = Overrides { wait_time: Some(-1.0), ..Default::default() };
        let s = Settings::load_from(env(&[]), &overrides).unwrap();
        assert!(s.collect_options().is_err());
    }
}
