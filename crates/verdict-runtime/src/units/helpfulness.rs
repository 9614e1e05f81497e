//! Helpfulness unit: usefulness, tone, and empathy.

use jsonschema::Validator;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{AgentOutcome, HelpfulnessPayload, UnitName};

use super::{completion, settle, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::HELPFULNESS_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::structured::{compile_schema, complete_structured};

pub struct HelpfulnessUnit {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_retries: usize,
    schema: Validator,
}

impl HelpfulnessUnit {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["score", "usefulness_score", "tone_score", "empathy_score"],
            "properties": {
                "score": { "type": "number" },
                "usefulness_score": { "type": "number" },
                "tone_score": { "type": "number" },
                "empathy_score": { "type": "number" },
                "suggestions": { "type": "array", "items": { "type": "string" } }
            }
        }));
        Self {
            provider,
            model: config.unit_model(UnitName::Helpfulness).to_string(),
            max_retries: config.max_retries,
            schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<HelpfulnessPayload> {
        let messages = vec![
            ChatMessage::system(HELPFULNESS_PROMPT),
            ChatMessage::user(format!(
                "Evaluate the helpfulness of this conversation:\n\n{}",
                ctx.transcript
            )),
        ];

        let result = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 800),
            &self.schema,
            self.max_retries,
        )
        .await;

        settle(
            UnitName::Helpfulness,
            result,
            HelpfulnessPayload::neutral,
            |value| {
                serde_json::from_value::<HelpfulnessPayload>(value)
                    .map(HelpfulnessPayload::clamped)
            },
        )
    }
}
