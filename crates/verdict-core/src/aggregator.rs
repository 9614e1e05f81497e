//! Aggregator: merges per-unit outcomes into one `EvaluationResult`.
//!
//! Aggregation never fails. Individual unit failures degrade only that
//! unit's slice of the result; the overall status records whether every
//! enabled unit fully succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::{
    AgentOutcome, CoherencePayload, FactualityPayload, HelpfulnessPayload, ImprovementPayload,
    SafetyPayload, SopCompliancePayload,
};
use crate::telemetry::Telemetry;

/// Whether every enabled unit returned `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Complete,
    Partial,
}

/// One typed outcome per enabled unit, as collected by the dispatcher.
///
/// Adding a unit means adding a field here; the exhaustive destructuring in
/// [`aggregate`] then fails to compile until the new unit is accounted for.
#[derive(Debug, Clone)]
pub struct UnitOutcomes {
    pub coherence: AgentOutcome<CoherencePayload>,
    pub factuality: AgentOutcome<FactualityPayload>,
    pub safety: AgentOutcome<SafetyPayload>,
    pub helpfulness: AgentOutcome<HelpfulnessPayload>,
    pub sop_compliance: AgentOutcome<SopCompliancePayload>,
    pub prompt_improvement: AgentOutcome<ImprovementPayload>,
}

/// The consolidated evaluation record. Created once per call, immutable
/// after construction, handed to the caller by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub coherence: AgentOutcome<CoherencePayload>,
    pub factuality: AgentOutcome<FactualityPayload>,
    pub safety: AgentOutcome<SafetyPayload>,
    pub helpfulness: AgentOutcome<HelpfulnessPayload>,
    pub sop_compliance: AgentOutcome<SopCompliancePayload>,
    pub prompt_improvement: AgentOutcome<ImprovementPayload>,
    pub telemetry: Telemetry,
    pub overall_status: OverallStatus,
    pub evaluated_at: DateTime<Utc>,
}

/// Merge unit outcomes and telemetry into the final result.
pub fn aggregate(outcomes: UnitOutcomes, telemetry: Telemetry) -> EvaluationResult {
    let UnitOutcomes {
        coherence,
        factuality,
        safety,
        helpfulness,
        sop_compliance,
        prompt_improvement,
    } = outcomes;

    let all_success = coherence.is_success()
        && factuality.is_success()
        && safety.is_success()
        && helpfulness.is_success()
        && sop_compliance.is_success()
        && prompt_improvement.is_success();

    let overall_status = if all_success {
        OverallStatus::Complete
    } else {
        OverallStatus::Partial
    };

    EvaluationResult {
        coherence,
        factuality,
        safety,
        helpfulness,
        sop_compliance,
        prompt_improvement,
        telemetry,
        overall_status,
        evaluated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::NEUTRAL_SCORE;

    fn all_success() -> UnitOutcomes {
        UnitOutcomes {
            coherence: AgentOutcome::Success {
                payload: CoherencePayload {
                    score: 0.9,
                    explanation: "clear".to_string(),
                },
            },
            factuality: AgentOutcome::Success {
                payload: FactualityPayload::vacuous(),
            },
            safety: AgentOutcome::Success {
                payload: SafetyPayload::neutral(),
            },
            helpfulness: AgentOutcome::Success {
                payload: HelpfulnessPayload::neutral(),
            },
            sop_compliance: AgentOutcome::Success {
                payload: SopCompliancePayload::vacuous(),
            },
            prompt_improvement: AgentOutcome::Success {
                payload: ImprovementPayload::noop("all dimensions above threshold"),
            },
        }
    }

    fn telemetry() -> Telemetry {
        Telemetry {
            latency_ms: 1200,
            input_tokens: 100,
            output_tokens: 40,
            cost_usd: Some(0.0001),
            model_used: "gpt-5-mini".to_string(),
        }
    }

    #[test]
    fn test_all_success_is_complete() {
        let result = aggregate(all_success(), telemetry());
        assert_eq!(result.overall_status, OverallStatus::Complete);
    }

    #[test]
    fn test_one_failure_makes_partial() {
        let mut outcomes = all_success();
        outcomes.safety = AgentOutcome::Failed {
            reason: "provider outage".to_string(),
        };
        let result = aggregate(outcomes, telemetry());
        assert_eq!(result.overall_status, OverallStatus::Partial);
        assert!(result.safety.is_failed());
        assert!(result.coherence.is_success());
    }

    #[test]
    fn test_degraded_makes_partial() {
        let mut outcomes = all_success();
        outcomes.coherence = AgentOutcome::Degraded {
            payload: CoherencePayload::neutral(),
            reason: "schema validation failed".to_string(),
        };
        let result = aggregate(outcomes, telemetry());
        assert_eq!(result.overall_status, OverallStatus::Partial);
        let payload = result.coherence.payload().unwrap();
        assert_eq!(payload.score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_result_serializes_every_unit_field() {
        let mut outcomes = all_success();
        outcomes.helpfulness = AgentOutcome::Failed {
            reason: "timeout".to_string(),
        };
        let result = aggregate(outcomes, telemetry());
        let json = serde_json::to_value(&result).unwrap();

        for key in [
            "coherence",
            "factuality",
            "safety",
            "helpfulness",
            "sop_compliance",
            "prompt_improvement",
            "telemetry",
            "overall_status",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
        // The disabled optimizer never surfaces.
        assert!(json.get("model_optimizer").is_none());
        assert!(json.get("model_recommendation").is_none());
        assert_eq!(json["helpfulness"]["status"], "failed");
        assert_eq!(json["overall_status"], "partial");
    }
}
