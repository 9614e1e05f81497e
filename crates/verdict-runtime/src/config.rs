//! Runtime configuration.
//!
//! Everything tunable about one dispatcher lives here: evaluator model ids,
//! timeouts, retry count, the factuality and improvement policy constants,
//! and cache sizing. Durations deserialize from humantime strings ("8s",
//! "2m") so config files stay readable.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use verdict_core::UnitName;

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn default_unit_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_global_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> usize {
    2
}

fn default_evaluator_model() -> String {
    "gpt-5-mini".to_string()
}

// Factuality is the one dimension where a wrong answer actively misleads,
// so it gets the stronger model.
fn default_factuality_model() -> String {
    "gpt-5.1".to_string()
}

fn default_optimizer_model() -> String {
    "gpt-5-nano".to_string()
}

fn default_max_claims() -> usize {
    5
}

fn default_max_search_results() -> usize {
    3
}

fn default_score_floor() -> f64 {
    0.75
}

fn default_risk_ceiling() -> f64 {
    0.30
}

fn default_contradiction_penalty() -> f64 {
    0.6
}

fn default_degraded_score_cap() -> f64 {
    0.5
}

/// Cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,

    #[serde(default = "default_cache_ttl", deserialize_with = "de_duration")]
    pub ttl: Duration,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_entries() -> u64 {
    10_000
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_entries(),
            ttl: default_cache_ttl(),
        }
    }
}

/// Configuration for one dispatcher instance.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Model used by most evaluator units.
    #[serde(default = "default_evaluator_model")]
    pub evaluator_model: String,

    /// Model used by claim extraction and claim verdicts.
    #[serde(default = "default_factuality_model")]
    pub factuality_model: String,

    /// Model used by the (disabled) optimizer unit.
    #[serde(default = "default_optimizer_model")]
    pub optimizer_model: String,

    /// Per-unit timeout bound.
    #[serde(default = "default_unit_timeout", deserialize_with = "de_duration")]
    pub unit_timeout: Duration,

    /// Ceiling for the whole evaluate() call.
    #[serde(default = "default_global_timeout", deserialize_with = "de_duration")]
    pub global_timeout: Duration,

    /// Retries per remote call after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Maximum claims extracted per reply.
    #[serde(default = "default_max_claims")]
    pub max_claims: usize,

    /// Search results fetched per claim.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Scores below this trigger the prompt improver.
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,

    /// Safety risk above this triggers the prompt improver.
    #[serde(default = "default_risk_ceiling")]
    pub risk_ceiling: f64,

    /// Multiplicative factuality penalty per contradicted claim.
    #[serde(default = "default_contradiction_penalty")]
    pub contradiction_penalty: f64,

    /// Factuality score cap when no claim could be verified.
    #[serde(default = "default_degraded_score_cap")]
    pub degraded_score_cap: f64,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            evaluator_model: default_evaluator_model(),
            factuality_model: default_factuality_model(),
            optimizer_model: default_optimizer_model(),
            unit_timeout: default_unit_timeout(),
            global_timeout: default_global_timeout(),
            max_retries: default_max_retries(),
            max_claims: default_max_claims(),
            max_search_results: default_max_search_results(),
            score_floor: default_score_floor(),
            risk_ceiling: default_risk_ceiling(),
            contradiction_penalty: default_contradiction_penalty(),
            degraded_score_cap: default_degraded_score_cap(),
            cache: CacheConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Timeout bound for one unit. Factuality runs a multi-call pipeline
    /// (extraction, searches, verdicts) and gets a doubled bound.
    pub fn unit_timeout(&self, unit: UnitName) -> Duration {
        match unit {
            UnitName::Factuality => self.unit_timeout * 2,
            _ => self.unit_timeout,
        }
    }

    /// Model used by a unit's completion calls.
    pub fn unit_model(&self, unit: UnitName) -> &str {
        match unit {
            UnitName::Factuality => &self.factuality_model,
            UnitName::ModelOptimizer => &self.optimizer_model,
            _ => &self.evaluator_model,
        }
    }
}
