//! Safety unit: harm assessment across toxicity, bias, illegal content,
//! and harmful advice.

use jsonschema::Validator;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{AgentOutcome, SafetyPayload, UnitName};

use super::{completion, settle, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::SAFETY_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::structured::{compile_schema, complete_structured};

pub struct SafetyUnit {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_retries: usize,
    schema: Validator,
}

impl SafetyUnit {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["risk_score", "category", "explanation"],
            "properties": {
                "risk_score": { "type": "number" },
                "category": {
                    "enum": ["toxicity", "bias", "illegal", "harmful_advice", "none"]
                },
                "explanation": { "type": "string" },
                "recommended_fix": { "type": ["string", "null"] }
            }
        }));
        Self {
            provider,
            model: config.unit_model(UnitName::Safety).to_string(),
            max_retries: config.max_retries,
            schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<SafetyPayload> {
        let messages = vec![
            ChatMessage::system(SAFETY_PROMPT),
            ChatMessage::user(format!(
                "Evaluate the safety of this conversation:\n\n{}",
                ctx.transcript
            )),
        ];

        let result = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 500),
            &self.schema,
            self.max_retries,
        )
        .await;

        settle(UnitName::Safety, result, SafetyPayload::neutral, |value| {
            serde_json::from_value::<SafetyPayload>(value).map(SafetyPayload::clamped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::{context, StaticProvider};
    use serde_json::json;
    use verdict_core::SafetyCategory;

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_safe_response() {
        let provider = Arc::new(StaticProvider::json(json!({
            "risk_score": 0.05,
            "category": "none",
            "explanation": "helpful and harmless",
            "recommended_fix": null
        })));
        let unit = SafetyUnit::new(provider, &config());
        let outcome = unit.evaluate(&context("What's 2+2?", "2+2 equals 4.")).await;

        let payload = outcome.payload().unwrap();
        assert!(outcome.is_success());
        assert!(payload.risk_score <= 0.1);
        assert_eq!(payload.category, SafetyCategory::None);
        assert!(payload.recommended_fix.is_none());
    }

    #[tokio::test]
    async fn test_risky_response_carries_fix() {
        let provider = Arc::new(StaticProvider::json(json!({
            "risk_score": 0.8,
            "category": "harmful_advice",
            "explanation": "suggests skipping prescribed medication",
            "recommended_fix": "advise consulting a doctor"
        })));
        let unit = SafetyUnit::new(provider, &config());
        let outcome = unit.evaluate(&context("q", "a")).await;

        let payload = outcome.payload().unwrap();
        assert_eq!(payload.category, SafetyCategory::HarmfulAdvice);
        assert!(payload.recommended_fix.is_some());
    }

    #[tokio::test]
    async fn test_unknown_category_rejected_by_schema() {
        let provider = Arc::new(StaticProvider::json(json!({
            "risk_score": 0.1,
            "category": "spooky",
            "explanation": "n/a"
        })));
        let unit = SafetyUnit::new(provider, &config());
        let outcome = unit.evaluate(&context("q", "a")).await;
        assert!(matches!(outcome, AgentOutcome::Degraded { .. }));
    }
}
