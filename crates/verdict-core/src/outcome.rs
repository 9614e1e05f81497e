//! Per-unit outcomes and payloads.
//!
//! Every evaluator unit resolves to exactly one [`AgentOutcome`]:
//! - `Success` - the unit completed and its payload passed validation
//! - `Degraded` - the unit completed with reduced confidence and carries a
//!   fallback payload (e.g. the remote checker answered but the structured
//!   response failed validation)
//! - `Failed` - the unit produced nothing usable (provider outage, timeout)
//!
//! Payloads are closed per-unit types so the aggregator matches them
//! exhaustively; adding a unit is a compile-time extension.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rules::{Severity, SopViolation};

/// Score used when a unit completes but its judgment is unusable.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Clamp a score into `[0, 1]`. Non-finite values collapse to the neutral
/// midpoint rather than poisoning downstream arithmetic.
pub fn clamp_score(value: f64) -> f64 {
    if !value.is_finite() {
        return NEUTRAL_SCORE;
    }
    value.clamp(0.0, 1.0)
}

/// The unit registry. `ModelOptimizer` is present but disabled; the
/// dispatcher skips it and no result field depends on its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitName {
    Coherence,
    Factuality,
    Safety,
    Helpfulness,
    SopCompliance,
    PromptImprover,
    ModelOptimizer,
}

impl UnitName {
    pub const ALL: [UnitName; 7] = [
        UnitName::Coherence,
        UnitName::Factuality,
        UnitName::Safety,
        UnitName::Helpfulness,
        UnitName::SopCompliance,
        UnitName::PromptImprover,
        UnitName::ModelOptimizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitName::Coherence => "coherence",
            UnitName::Factuality => "factuality",
            UnitName::Safety => "safety",
            UnitName::Helpfulness => "helpfulness",
            UnitName::SopCompliance => "sop_compliance",
            UnitName::PromptImprover => "prompt_improver",
            UnitName::ModelOptimizer => "model_optimizer",
        }
    }

    /// Whether the dispatcher runs this unit.
    pub fn enabled(&self) -> bool {
        !matches!(self, UnitName::ModelOptimizer)
    }

    pub fn enabled_units() -> impl Iterator<Item = UnitName> {
        Self::ALL.into_iter().filter(UnitName::enabled)
    }
}

impl std::fmt::Display for UnitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluator unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome<P> {
    Success { payload: P },
    Degraded { payload: P, reason: String },
    Failed { reason: String },
}

impl<P> AgentOutcome<P> {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AgentOutcome::Failed { .. })
    }

    /// The payload, if the unit produced one (`Success` or `Degraded`).
    pub fn payload(&self) -> Option<&P> {
        match self {
            AgentOutcome::Success { payload } | AgentOutcome::Degraded { payload, .. } => {
                Some(payload)
            }
            AgentOutcome::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AgentOutcome::Success { .. } => None,
            AgentOutcome::Degraded { reason, .. } | AgentOutcome::Failed { reason } => {
                Some(reason.as_str())
            }
        }
    }
}

/// Clarity and logical-flow judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherencePayload {
    pub score: f64,
    pub explanation: String,
}

impl CoherencePayload {
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            explanation: "unavailable".to_string(),
        }
    }

    pub fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self
    }
}

/// Claim-verification judgment produced by the factuality sub-pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactualityPayload {
    pub score: f64,
    pub hallucination_likelihood: f64,
    #[serde(default)]
    pub corrected_facts: Vec<String>,
    #[serde(default)]
    pub sources_checked: Vec<String>,
    #[serde(default)]
    pub claims_checked: u32,
}

impl FactualityPayload {
    /// The nothing-to-falsify short-circuit: a reply with zero extractable
    /// claims is vacuously factual.
    pub fn vacuous() -> Self {
        Self {
            score: 1.0,
            hallucination_likelihood: 0.0,
            corrected_facts: Vec::new(),
            sources_checked: Vec::new(),
            claims_checked: 0,
        }
    }

    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            hallucination_likelihood: NEUTRAL_SCORE,
            corrected_facts: Vec::new(),
            sources_checked: Vec::new(),
            claims_checked: 0,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self.hallucination_likelihood = clamp_score(self.hallucination_likelihood);
        self
    }
}

/// Primary risk category flagged by the safety unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Toxicity,
    Bias,
    Illegal,
    HarmfulAdvice,
    None,
}

/// Harm assessment of the assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyPayload {
    pub risk_score: f64,
    pub category: SafetyCategory,
    pub explanation: String,
    #[serde(default)]
    pub recommended_fix: Option<String>,
}

impl SafetyPayload {
    pub fn neutral() -> Self {
        Self {
            risk_score: NEUTRAL_SCORE,
            category: SafetyCategory::None,
            explanation: "unavailable".to_string(),
            recommended_fix: None,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.risk_score = clamp_score(self.risk_score);
        self
    }
}

/// Usefulness, tone, and empathy judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpfulnessPayload {
    pub score: f64,
    pub usefulness_score: f64,
    pub tone_score: f64,
    pub empathy_score: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl HelpfulnessPayload {
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            usefulness_score: NEUTRAL_SCORE,
            tone_score: NEUTRAL_SCORE,
            empathy_score: NEUTRAL_SCORE,
            suggestions: Vec::new(),
        }
    }

    pub fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self.usefulness_score = clamp_score(self.usefulness_score);
        self.tone_score = clamp_score(self.tone_score);
        self.empathy_score = clamp_score(self.empathy_score);
        self
    }
}

/// Rule-engine verdict. `violations` is sorted severity-descending with ties
/// broken by ascending rule id; `unverifiable_rules` lists rule ids the
/// semantic checker could not be reached for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopCompliancePayload {
    pub compliant: bool,
    #[serde(default)]
    pub violations: Vec<SopViolation>,
    #[serde(default)]
    pub severity_summary: BTreeMap<Severity, u32>,
    #[serde(default)]
    pub unverifiable_rules: Vec<String>,
}

impl SopCompliancePayload {
    /// Compliant-by-absence: an empty rule set has nothing to violate.
    pub fn vacuous() -> Self {
        Self {
            compliant: true,
            violations: Vec::new(),
            severity_summary: BTreeMap::new(),
            unverifiable_rules: Vec::new(),
        }
    }

    pub fn neutral() -> Self {
        Self::vacuous()
    }
}

/// Prompt-improvement suggestion. `improved_prompt == None` is the explicit
/// no-op: every other dimension cleared the quality threshold, so no
/// improvement is invented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementPayload {
    #[serde(default)]
    pub improved_prompt: Option<String>,
    pub reasoning: String,
    #[serde(default)]
    pub changes_made: Vec<String>,
}

impl ImprovementPayload {
    pub fn noop(reasoning: impl Into<String>) -> Self {
        Self {
            improved_prompt: None,
            reasoning: reasoning.into(),
            changes_made: Vec::new(),
        }
    }

    pub fn neutral() -> Self {
        Self::noop("unavailable")
    }
}

/// A cheaper-model alternative considered by the optimizer unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAlternative {
    pub model: String,
    pub cost_estimate: Option<f64>,
}

/// Model-routing recommendation. Same contract shape as every other unit,
/// but `UnitName::ModelOptimizer` is disabled and this payload never appears
/// in an [`crate::EvaluationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPayload {
    pub recommended_model: String,
    pub cost_estimate: Option<f64>,
    pub reasoning: String,
    #[serde(default)]
    pub alternatives: Vec<ModelAlternative>,
}

impl RecommendationPayload {
    pub fn neutral() -> Self {
        Self {
            recommended_model: String::new(),
            cost_estimate: None,
            reasoning: "unavailable".to_string(),
            alternatives: Vec::new(),
        }
    }
}
