//! Prompt improver: rewrites the user prompt when other dimensions flag
//! quality problems.
//!
//! The unit only invents an improvement when there is something to improve.
//! A turn that clears every threshold gets the explicit no-op payload and
//! costs no tokens.

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{
    AgentOutcome, CoherencePayload, FactualityPayload, HelpfulnessPayload, ImprovementPayload,
    SafetyPayload, SopCompliancePayload, UnitName,
};

use super::{completion, settle, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::IMPROVER_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::structured::{compile_schema, complete_structured};

/// The five first-pass outcomes the improver synthesizes.
pub struct FirstPass<'a> {
    pub coherence: &'a AgentOutcome<CoherencePayload>,
    pub factuality: &'a AgentOutcome<FactualityPayload>,
    pub safety: &'a AgentOutcome<SafetyPayload>,
    pub helpfulness: &'a AgentOutcome<HelpfulnessPayload>,
    pub sop_compliance: &'a AgentOutcome<SopCompliancePayload>,
}

#[derive(Debug, Deserialize)]
struct WireImprovement {
    improved_prompt: String,
    reasoning: String,
    #[serde(default)]
    changes_made: Vec<String>,
}

pub struct ImproverUnit {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_retries: usize,
    score_floor: f64,
    risk_ceiling: f64,
    schema: Validator,
}

impl ImproverUnit {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["improved_prompt", "reasoning"],
            "properties": {
                "improved_prompt": { "type": "string" },
                "reasoning": { "type": "string" },
                "changes_made": { "type": "array", "items": { "type": "string" } }
            }
        }));
        Self {
            provider,
            model: config.unit_model(UnitName::PromptImprover).to_string(),
            max_retries: config.max_retries,
            score_floor: config.score_floor,
            risk_ceiling: config.risk_ceiling,
            schema,
        }
    }

    /// Why this turn needs an improved prompt, or `None` when every
    /// dimension cleared its threshold.
    fn trigger(&self, first_pass: &FirstPass<'_>) -> Option<String> {
        if let Some(payload) = first_pass.coherence.payload() {
            if payload.score < self.score_floor {
                return Some(format!("coherence score {:.2}", payload.score));
            }
        } else {
            return Some("coherence unit failed".to_string());
        }

        if let Some(payload) = first_pass.factuality.payload() {
            if payload.score < self.score_floor {
                return Some(format!("factuality score {:.2}", payload.score));
            }
        } else {
            return Some("factuality unit failed".to_string());
        }

        if let Some(payload) = first_pass.safety.payload() {
            if payload.risk_score > self.risk_ceiling {
                return Some(format!("safety risk {:.2}", payload.risk_score));
            }
        } else {
            return Some("safety unit failed".to_string());
        }

        if let Some(payload) = first_pass.helpfulness.payload() {
            if payload.score < self.score_floor {
                return Some(format!("helpfulness score {:.2}", payload.score));
            }
        } else {
            return Some("helpfulness unit failed".to_string());
        }

        if let Some(payload) = first_pass.sop_compliance.payload() {
            if !payload.compliant {
                return Some(format!("{} SOP violation(s)", payload.violations.len()));
            }
        } else {
            return Some("SOP compliance unit failed".to_string());
        }

        None
    }

    pub async fn evaluate(
        &self,
        ctx: &UnitContext,
        first_pass: &FirstPass<'_>,
    ) -> AgentOutcome<ImprovementPayload> {
        let Some(trigger) = self.trigger(first_pass) else {
            return AgentOutcome::Success {
                payload: ImprovementPayload::noop(
                    "all dimensions scored above the improvement threshold",
                ),
            };
        };

        let summary = json!({
            "coherence": first_pass.coherence,
            "factuality": first_pass.factuality,
            "safety": first_pass.safety,
            "helpfulness": first_pass.helpfulness,
            "sop_compliance": first_pass.sop_compliance,
        });

        let original = ctx.last_user.clone();
        let messages = vec![
            ChatMessage::system(IMPROVER_PROMPT),
            ChatMessage::user(format!(
                "Original prompt: {original}\n\nAI response: {}\n\nTriggered by: {trigger}\n\nEvaluation results:\n{}",
                ctx.last_assistant,
                serde_json::to_string_pretty(&summary).unwrap_or_default()
            )),
        ];

        let result = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 1200),
            &self.schema,
            self.max_retries,
        )
        .await;

        settle(
            UnitName::PromptImprover,
            result,
            ImprovementPayload::neutral,
            move |value| {
                let wire: WireImprovement = serde_json::from_value(value)?;
                let improved = wire.improved_prompt.trim();
                // Only keep a meaningfully different rewrite.
                if improved.is_empty() || improved == original {
                    Ok(ImprovementPayload::noop(
                        "model proposed no meaningful change",
                    ))
                } else {
                    Ok(ImprovementPayload {
                        improved_prompt: Some(improved.to_string()),
                        reasoning: wire.reasoning,
                        changes_made: wire.changes_made,
                    })
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::{context, StaticProvider};
    use serde_json::json;
    use verdict_core::{SafetyCategory, SopCompliancePayload};

    fn good_first_pass() -> (
        AgentOutcome<CoherencePayload>,
        AgentOutcome<FactualityPayload>,
        AgentOutcome<SafetyPayload>,
        AgentOutcome<HelpfulnessPayload>,
        AgentOutcome<SopCompliancePayload>,
    ) {
        (
            AgentOutcome::Success {
                payload: CoherencePayload {
                    score: 0.9,
                    explanation: "clear".to_string(),
                },
            },
            AgentOutcome::Success {
                payload: FactualityPayload::vacuous(),
            },
            AgentOutcome::Success {
                payload: SafetyPayload {
                    risk_score: 0.05,
                    category: SafetyCategory::None,
                    explanation: "safe".to_string(),
                    recommended_fix: None,
                },
            },
            AgentOutcome::Success {
                payload: HelpfulnessPayload {
                    score: 0.85,
                    usefulness_score: 0.85,
                    tone_score: 0.9,
                    empathy_score: 0.8,
                    suggestions: vec![],
                },
            },
            AgentOutcome::Success {
                payload: SopCompliancePayload::vacuous(),
            },
        )
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_good_scores_return_noop_without_llm_call() {
        // An outage provider proves no call is made on the no-op path.
        let unit = ImproverUnit::new(Arc::new(crate::units::testing::OutageProvider), &config());
        let (coherence, factuality, safety, helpfulness, sop) = good_first_pass();
        let first_pass = FirstPass {
            coherence: &coherence,
            factuality: &factuality,
            safety: &safety,
            helpfulness: &helpfulness,
            sop_compliance: &sop,
        };
        let outcome = unit.evaluate(&context("q", "a"), &first_pass).await;

        assert!(outcome.is_success());
        assert!(outcome.payload().unwrap().improved_prompt.is_none());
    }

    #[tokio::test]
    async fn test_low_coherence_triggers_rewrite() {
        let provider = Arc::new(StaticProvider::json(json!({
            "improved_prompt": "Explain quantum physics in three simple paragraphs for a beginner.",
            "reasoning": "the original prompt was too open-ended",
            "changes_made": ["added audience", "added structure"]
        })));
        let unit = ImproverUnit::new(provider, &config());

        let (_, factuality, safety, helpfulness, sop) = good_first_pass();
        let coherence = AgentOutcome::Success {
            payload: CoherencePayload {
                score: 0.3,
                explanation: "rambling".to_string(),
            },
        };
        let first_pass = FirstPass {
            coherence: &coherence,
            factuality: &factuality,
            safety: &safety,
            helpfulness: &helpfulness,
            sop_compliance: &sop,
        };
        let outcome = unit
            .evaluate(&context("Explain quantum physics", "um... cats?"), &first_pass)
            .await;

        let payload = outcome.payload().unwrap();
        assert!(outcome.is_success());
        assert!(payload.improved_prompt.is_some());
        assert_eq!(payload.changes_made.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_rewrite_collapses_to_noop() {
        let provider = Arc::new(StaticProvider::json(json!({
            "improved_prompt": "Explain quantum physics",
            "reasoning": "nothing better found",
            "changes_made": []
        })));
        let unit = ImproverUnit::new(provider, &config());

        let (_, factuality, safety, helpfulness, sop) = good_first_pass();
        let coherence = AgentOutcome::Failed {
            reason: "timeout".to_string(),
        };
        let first_pass = FirstPass {
            coherence: &coherence,
            factuality: &factuality,
            safety: &safety,
            helpfulness: &helpfulness,
            sop_compliance: &sop,
        };
        let outcome = unit
            .evaluate(&context("Explain quantum physics", "cats"), &first_pass)
            .await;

        assert!(outcome.is_success());
        assert!(outcome.payload().unwrap().improved_prompt.is_none());
    }

    #[tokio::test]
    async fn test_failed_sibling_counts_as_trigger() {
        let unit = ImproverUnit::new(
            Arc::new(StaticProvider::json(json!({
                "improved_prompt": "be specific",
                "reasoning": "quality unknown",
                "changes_made": []
            }))),
            &config(),
        );
        let (coherence, factuality, _, helpfulness, sop) = good_first_pass();
        let safety = AgentOutcome::Failed {
            reason: "outage".to_string(),
        };
        let first_pass = FirstPass {
            coherence: &coherence,
            factuality: &factuality,
            safety: &safety,
            helpfulness: &helpfulness,
            sop_compliance: &sop,
        };
        let outcome = unit.evaluate(&context("q", "a"), &first_pass).await;
        assert!(outcome.payload().unwrap().improved_prompt.is_some());
    }
}
