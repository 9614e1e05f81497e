//! Model optimizer unit: routing recommendation.
//!
//! Present in the unit registry with the same contract shape as every
//! other unit, but disabled by default; the dispatcher skips it and its
//! payload never enters an `EvaluationResult`. Callers who want a routing
//! hint invoke it explicitly through `Dispatcher::recommend`.

use jsonschema::Validator;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{
    cost_usd, estimate_tokens, AgentOutcome, ModelAlternative, RecommendationPayload, UnitName,
};

use super::{completion, settle, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::OPTIMIZER_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::registry::SharedPricing;
use crate::structured::{compile_schema, complete_structured};

/// Output-length assumption used for cost comparisons.
const ASSUMED_OUTPUT_TOKENS: u32 = 500;

/// Fallback when the model names something missing from the pricing table.
const FALLBACK_MODEL: &str = "gpt-5-mini";

const COMPARISON_MODELS: [&str; 4] = [
    "gpt-5-nano",
    "gpt-5-mini",
    "claude-haiku-4.5",
    "gemini-2.5-flash",
];

pub struct OptimizerUnit {
    provider: Arc<dyn LlmProvider>,
    pricing: Arc<SharedPricing>,
    model: String,
    max_retries: usize,
    schema: Validator,
}

impl OptimizerUnit {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        pricing: Arc<SharedPricing>,
        config: &RuntimeConfig,
    ) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["recommended_model", "reasoning"],
            "properties": {
                "recommended_model": { "type": "string" },
                "reasoning": { "type": "string" }
            }
        }));
        Self {
            provider,
            pricing,
            model: config.unit_model(UnitName::ModelOptimizer).to_string(),
            max_retries: config.max_retries,
            schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<RecommendationPayload> {
        let pricing = self.pricing.snapshot();
        let input_tokens = estimate_tokens(&ctx.transcript);

        let messages = vec![
            ChatMessage::system(OPTIMIZER_PROMPT),
            ChatMessage::user(format!(
                "Recommend a model for this conversation:\n\n{}",
                ctx.transcript
            )),
        ];

        let result = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 400),
            &self.schema,
            self.max_retries,
        )
        .await;

        settle(
            UnitName::ModelOptimizer,
            result,
            RecommendationPayload::neutral,
            move |value| {
                let mut recommended = value["recommended_model"]
                    .as_str()
                    .unwrap_or(FALLBACK_MODEL)
                    .to_string();
                if pricing.lookup(&recommended).is_none() {
                    recommended = FALLBACK_MODEL.to_string();
                }

                let cost_estimate = pricing
                    .lookup(&recommended)
                    .map(|entry| cost_usd(input_tokens, ASSUMED_OUTPUT_TOKENS, entry));

                let alternatives = COMPARISON_MODELS
                    .iter()
                    .filter(|m| **m != recommended)
                    .filter_map(|m| {
                        pricing.lookup(m).map(|entry| ModelAlternative {
                            model: m.to_string(),
                            cost_estimate: Some(cost_usd(
                                input_tokens,
                                ASSUMED_OUTPUT_TOKENS,
                                entry,
                            )),
                        })
                    })
                    .collect();

                Ok(RecommendationPayload {
                    recommended_model: recommended,
                    cost_estimate,
                    reasoning: value["reasoning"]
                        .as_str()
                        .unwrap_or("model selected for task complexity")
                        .to_string(),
                    alternatives,
                })
            },
        )
    }
}
