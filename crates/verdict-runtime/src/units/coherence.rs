//! Coherence unit: clarity and logical flow of the reply.

use jsonschema::Validator;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{AgentOutcome, CoherencePayload, UnitName};

use super::{completion, settle, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::COHERENCE_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::structured::{compile_schema, complete_structured};

pub struct CoherenceUnit {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_retries: usize,
    schema: Validator,
}

impl CoherenceUnit {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["score", "explanation"],
            "properties": {
                "score": { "type": "number" },
                "explanation": { "type": "string" }
            }
        }));
        Self {
            provider,
            model: config.unit_model(UnitName::Coherence).to_string(),
            max_retries: config.max_retries,
            schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<CoherencePayload> {
        let messages = vec![
            ChatMessage::system(COHERENCE_PROMPT),
            ChatMessage::user(format!(
                "Evaluate the coherence of this conversation:\n\n{}",
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

        settle(UnitName::Coherence, result, CoherencePayload::neutral, |value| {
            serde_json::from_value::<CoherencePayload>(value).map(CoherencePayload::clamped)
        })
    }
}
