//! SOP rule set: configurable compliance checks with severity levels.
//!
//! Rules are loaded once at process start (YAML or the compiled-in default
//! set) and are read-only for the lifetime of an evaluation call. Violations
//! are scoped to a single result and carry a deterministic order.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Violation severity. Declaration order defines the ordering used for the
/// deterministic sort: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One compliance rule. The description is the natural-language check handed
/// to the semantic checker verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
}

/// A rule found violated for one specific response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopViolation {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub description: String,
}

/// Sort violations severity-descending, ties broken by ascending rule id.
/// Same input always yields the same order.
pub fn sort_violations(violations: &mut [SopViolation]) {
    violations.sort_by(|a, b| {
        (Reverse(a.severity), &a.rule_id).cmp(&(Reverse(b.severity), &b.rule_id))
    });
}

/// Count violations per severity level.
pub fn severity_summary(violations: &[SopViolation]) -> BTreeMap<Severity, u32> {
    let mut summary = BTreeMap::new();
    for violation in violations {
        *summary.entry(violation.severity).or_insert(0) += 1;
    }
    summary
}

/// Errors loading or validating a rule set.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to read rule set file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rule set YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),

    #[error("Rule has blank id")]
    BlankRuleId,
}

/// A versioned, ordered collection of SOP rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<SopRule>,
}

impl RuleSet {
    /// Empty rule set; every response is vacuously compliant against it.
    pub fn empty() -> Self {
        Self {
            version: "empty".to_string(),
            rules: Vec::new(),
        }
    }

    /// The compiled-in default rule set.
    pub fn builtin() -> Self {
        let rules = vec![
            SopRule {
                id: "SOP-001".to_string(),
                name: "Professional Tone".to_string(),
                description: "The response maintains a professional, courteous tone \
                              appropriate for a customer-facing assistant."
                    .to_string(),
                severity: Severity::Low,
            },
            SopRule {
                id: "SOP-002".to_string(),
                name: "No Personal Data Disclosure".to_string(),
                description: "The response never reveals personal data such as email \
                              addresses, phone numbers, account numbers, or government \
                              identifiers belonging to any individual."
                    .to_string(),
                severity: Severity::Critical,
            },
            SopRule {
                id: "SOP-003".to_string(),
                name: "Regulated Advice Disclaimer".to_string(),
                description: "Medical, legal, or financial guidance includes a \
                              recommendation to consult a qualified professional."
                    .to_string(),
                severity: Severity::High,
            },
            SopRule {
                id: "SOP-004".to_string(),
                name: "Escalation Offer".to_string(),
                description: "When the assistant cannot fully resolve the request, it \
                              offers a path to human assistance."
                    .to_string(),
                severity: Severity::Medium,
            },
            SopRule {
                id: "SOP-005".to_string(),
                name: "No Fabricated Citations".to_string(),
                description: "The response does not cite sources, statistics, or \
                              references that it cannot substantiate."
                    .to_string(),
                severity: Severity::High,
            },
        ];
        Self {
            version: "builtin-1".to_string(),
            rules,
        }
    }

    /// Parse a rule set from YAML and validate rule ids.
    pub fn from_yaml(yaml: &str) -> Result<Self, RulesError> {
        let set: RuleSet = serde_yaml::from_str(yaml)?;
        set.check_ids()?;
        Ok(set)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    fn check_ids(&self) -> Result<(), RulesError> {
        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(RulesError::BlankRuleId);
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RulesError::DuplicateRuleId(rule.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn violation(rule_id: &str, severity: Severity) -> SopViolation {
        SopViolation {
            rule_id: rule_id.to_string(),
            rule_name: format!("rule {rule_id}"),
            severity,
            description: "violated".to_string(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_violation_sort_severity_then_id() {
        let mut violations = vec![
            violation("SOP-009", Severity::Low),
            violation("SOP-002", Severity::Critical),
            violation("SOP-005", Severity::High),
            violation("SOP-001", Severity::High),
        ];
        sort_violations(&mut violations);
        let ids: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["SOP-002", "SOP-001", "SOP-005", "SOP-009"]);
    }

    #[test]
    fn test_severity_summary_counts() {
        let violations = vec![
            violation("a", Severity::High),
            violation("b", Severity::High),
            violation("c", Severity::Low),
        ];
        let summary = severity_summary(&violations);
        assert_eq!(summary.get(&Severity::High), Some(&2));
        assert_eq!(summary.get(&Severity::Low), Some(&1));
        assert_eq!(summary.get(&Severity::Critical), None);
    }

    #[test]
    fn test_builtin_rule_set_is_valid() {
        let set = RuleSet::builtin();
        assert!(!set.is_empty());
        assert!(set.check_ids().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
version: "team-a-2025-06"
rules:
  - id: "SOP-100"
    name: "Greeting"
    description: "The response opens with a greeting."
    severity: low
  - id: "SOP-101"
    name: "No Refund Promises"
    description: "The response never promises a refund without approval."
    severity: critical
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(set.version, "team-a-2025-06");
        assert_eq!(set.len(), 2);
        assert_eq!(set.rules[1].severity, Severity::Critical);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
version: "dup"
rules:
  - id: "SOP-1"
    name: "a"
    description: "a"
    severity: low
  - id: "SOP-1"
    name: "b"
    description: "b"
    severity: high
"#;
        assert!(matches!(
            RuleSet::from_yaml(yaml),
            Err(RulesError::DuplicateRuleId(_))
        ));
    }

    proptest! {
        // Sorting is deterministic and total: any shuffle of the same
        // violations sorts to the same sequence.
        #[test]
        fn prop_sort_is_order_insensitive(seed in 0u64..1000) {
            let mut base = vec![
                violation("SOP-003", Severity::Medium),
                violation("SOP-001", Severity::Critical),
                violation("SOP-004", Severity::Medium),
                violation("SOP-002", Severity::Critical),
            ];
            let mut shuffled = base.clone();
            shuffled.rotate_left((seed % 4) as usize);
            sort_violations(&mut base);
            sort_violations(&mut shuffled);
            prop_assert_eq!(base, shuffled);
        }
    }
}
