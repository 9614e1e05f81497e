//! # verdict-core
//!
//! Deterministic data model and aggregation for the Verdict evaluation
//! engine.
//!
//! This crate defines everything that does not touch the network: the
//! conversation model and request validation, per-unit outcome and payload
//! types, the SOP rule set with its deterministic violation ordering, the
//! versioned pricing table, the telemetry calculator, and the aggregator
//! that merges partially-failing unit outcomes into one well-formed
//! [`EvaluationResult`].
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same outcomes in, same result out (violation order
//!    included)
//! 2. **No I/O on the hot path**: rule sets and pricing tables are plain
//!    values loaded by the caller
//! 3. **Total aggregation**: unit failures degrade their slice of the
//!    result, never the call
//! 4. **Clamped scores**: every score leaving this crate lies in `[0, 1]`
//!
//! The async orchestration that produces unit outcomes lives in
//! `verdict-runtime`.

pub mod aggregator;
pub mod conversation;
pub mod outcome;
pub mod pricing;
pub mod rules;
pub mod telemetry;

pub use aggregator::{aggregate, EvaluationResult, OverallStatus, UnitOutcomes};
pub use conversation::{ConversationMessage, EvaluationRequest, RequestError, Role};
pub use outcome::{
    clamp_score, AgentOutcome, CoherencePayload, FactualityPayload, HelpfulnessPayload,
    ImprovementPayload, ModelAlternative, RecommendationPayload, SafetyCategory, SafetyPayload,
    SopCompliancePayload, UnitName, NEUTRAL_SCORE,
};
pub use pricing::{PricingEntry, PricingError, PricingTable};
pub use rules::{
    severity_summary, sort_violations, RuleSet, RulesError, Severity, SopRule, SopViolation,
};
pub use telemetry::{build_telemetry, cost_usd, estimate_tokens, Telemetry};
