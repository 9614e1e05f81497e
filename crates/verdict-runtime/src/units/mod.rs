//! Evaluator units.
//!
//! Each unit scores one quality dimension in isolation:
//! - no shared mutable state between units
//! - no access to sibling outcomes during the first-pass fan-out (the
//!   prompt improver runs afterwards and receives them explicitly)
//! - remote calls only through the injected provider/search capabilities
//!
//! Units absorb their own failures into [`AgentOutcome`]; the dispatcher
//! adds the timeout bound on top.

use serde_json::Value;
use verdict_core::{AgentOutcome, UnitName};

use crate::providers::{CompletionConfig, TokenUsage};
use crate::structured::StructuredError;

mod coherence;
mod factuality;
mod helpfulness;
mod improver;
mod optimizer;
mod safety;
mod sop;

pub use coherence::CoherenceUnit;
pub use factuality::FactualityUnit;
pub use helpfulness::HelpfulnessUnit;
pub use improver::{FirstPass, ImproverUnit};
pub use optimizer::OptimizerUnit;
pub use safety::SafetyUnit;
pub use sop::SopUnit;

/// Normalized view of one request, computed once per evaluation and shared
/// read-only by every unit.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub transcript: String,
    pub last_user: String,
    pub last_assistant: String,
    pub model: String,
}

impl UnitContext {
    /// Build from a request that already passed validation.
    pub fn new(request: &verdict_core::EvaluationRequest) -> Self {
        Self {
            transcript: request.transcript(),
            last_user: request.last_user().unwrap_or_default().to_string(),
            last_assistant: request.last_assistant().unwrap_or_default().to_string(),
            model: request.model.clone(),
        }
    }
}

pub(crate) fn completion(model: &str, max_tokens: u32) -> CompletionConfig {
    CompletionConfig::for_model(model).with_max_tokens(max_tokens)
}

/// Map a structured-completion result to an outcome.
///
/// `finish` turns the schema-validated JSON into the unit payload (clamping
/// included). A provider failure fails the unit; a malformed-but-received
/// response degrades to the neutral payload so the result keeps its shape.
pub(crate) fn settle<P>(
    unit: UnitName,
    result: Result<(Value, TokenUsage), StructuredError>,
    neutral: impl FnOnce() -> P,
    finish: impl FnOnce(Value) -> Result<P, serde_json::Error>,
) -> AgentOutcome<P> {
    match result {
        Ok((value, usage)) => {
            tracing::debug!(
                unit = %unit,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "unit completion finished"
            );
            match finish(value) {
                Ok(payload) => AgentOutcome::Success { payload },
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %e, "validated payload failed to decode");
                    AgentOutcome::Degraded {
                        payload: neutral(),
                        reason: format!("payload decode failed: {e}"),
                    }
                }
            }
        }
        Err(StructuredError::Json(detail)) | Err(StructuredError::Schema(detail)) => {
            tracing::warn!(unit = %unit, detail = %detail, "structured response invalid after retries");
            AgentOutcome::Degraded {
                payload: neutral(),
                reason: format!("structured response invalid: {detail}"),
            }
        }
        Err(StructuredError::Provider(e)) => {
            tracing::warn!(unit = %unit, error = %e, "provider call failed after retries");
            AgentOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
