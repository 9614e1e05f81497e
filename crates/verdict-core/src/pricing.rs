//! Versioned model pricing table.
//!
//! Prices are USD per 1,000 tokens, looked up by exact model identifier.
//! A missing model is a distinct condition surfaced as a degraded cost in
//! telemetry, never a crash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Per-1k-token prices for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Errors loading a pricing table.
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Failed to read pricing file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pricing YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Negative price for model {0}")]
    NegativePrice(String),
}

/// Static mapping of model identifier to prices, stamped with a version so
/// reloads are observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    pub version: String,
    pub models: BTreeMap<String, PricingEntry>,
}

impl PricingTable {
    /// Exact-identifier lookup. No fuzzy matching: `"gpt-5-mini"` and
    /// `"gpt-5-mini-2025"` are different models.
    pub fn lookup(&self, model: &str) -> Option<&PricingEntry> {
        self.models.get(model)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PricingError> {
        let table: PricingTable = serde_yaml::from_str(yaml)?;
        table.check_prices()?;
        Ok(table)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PricingError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn check_prices(&self) -> Result<(), PricingError> {
        for (model, entry) in &self.models {
            if entry.input_per_1k < 0.0 || entry.output_per_1k < 0.0 {
                return Err(PricingError::NegativePrice(model.clone()));
            }
        }
        Ok(())
    }

    /// The compiled-in January-2025 table.
    pub fn builtin() -> Self {
        fn entry(input_per_1k: f64, output_per_1k: f64) -> PricingEntry {
            PricingEntry {
                input_per_1k,
                output_per_1k,
            }
        }

        let mut models = BTreeMap::new();
        // OpenAI
        models.insert("gpt-5.2".to_string(), entry(0.00175, 0.014));
        models.insert("gpt-5.1".to_string(), entry(0.00125, 0.010));
        models.insert("gpt-5-mini".to_string(), entry(0.00025, 0.002));
        models.insert("gpt-5-nano".to_string(), entry(0.00005, 0.0004));
        models.insert("o3-pro".to_string(), entry(0.020, 0.080));
        models.insert("o3".to_string(), entry(0.002, 0.008));
        models.insert("o4-mini".to_string(), entry(0.0011, 0.0044));
        models.insert("gpt-4o".to_string(), entry(0.0025, 0.010));
        models.insert("gpt-4o-mini".to_string(), entry(0.00015, 0.0006));
        // Anthropic
        models.insert("claude-opus-4.5".to_string(), entry(0.005, 0.025));
        models.insert("claude-opus-4.1".to_string(), entry(0.015, 0.075));
        models.insert("claude-sonnet-4.5".to_string(), entry(0.003, 0.015));
        models.insert("claude-sonnet-4".to_string(), entry(0.003, 0.015));
        models.insert("claude-haiku-4.5".to_string(), entry(0.001, 0.005));
        models.insert("claude-haiku-3.5".to_string(), entry(0.0008, 0.004));
        // Google
        models.insert("gemini-3-pro".to_string(), entry(0.002, 0.012));
        models.insert("gemini-2.5-pro".to_string(), entry(0.00125, 0.010));
        models.insert("gemini-2.5-flash".to_string(), entry(0.0003, 0.0025));
        models.insert("gemini-2.5-flash-lite".to_string(), entry(0.0001, 0.0004));
        models.insert("gemini-2.0-flash".to_string(), entry(0.0001, 0.0004));

        Self {
            version: "2025-01".to_string(),
            models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let table = PricingTable::builtin();
        let entry = table.lookup("gpt-5-mini").unwrap();
        assert_eq!(entry.input_per_1k, 0.00025);
        assert_eq!(entry.output_per_1k, 0.002);
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = PricingTable::builtin();
        assert!(table.lookup("gpt-5-mini").is_some());
        assert!(table.lookup("gpt-5-mini ").is_none());
        assert!(table.lookup("unknown-model-x").is_none());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
version: "2025-06"
models:
  in-house-7b:
    input_per_1k: 0.0001
    output_per_1k: 0.0002
"#;
        let table = PricingTable::from_yaml(yaml).unwrap();
        assert_eq!(table.version, "2025-06");
        assert!(table.lookup("in-house-7b").is_some());
    }

    #[test]
    fn test_negative_price_rejected() {
        let yaml = r#"
version: "bad"
models:
  broken:
    input_per_1k: -1.0
    output_per_1k: 0.0
"#;
        assert!(matches!(
            PricingTable::from_yaml(yaml),
            Err(PricingError::NegativePrice(_))
        ));
    }
}
