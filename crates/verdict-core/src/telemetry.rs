//! Usage telemetry: latency, token counts, and monetary cost.
//!
//! Cost is a pure function of token counts and the pricing table entry for
//! the evaluated model. An unknown model degrades the cost to `None` and is
//! logged, never raised.

use serde::{Deserialize, Serialize};

use crate::conversation::EvaluationRequest;
use crate::pricing::{PricingEntry, PricingTable};

/// Telemetry block attached to every evaluation result.
///
/// `cost_usd == None` means the evaluated model was absent from the pricing
/// table; everything else in the result is unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub latency_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: Option<f64>,
    pub model_used: String,
}

/// Rough token estimate at ~4 characters per token. Good enough for cost
/// accounting; exact counts would require the model's own tokenizer.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

/// `cost = (input/1000) * input_price + (output/1000) * output_price`.
pub fn cost_usd(input_tokens: u32, output_tokens: u32, entry: &PricingEntry) -> f64 {
    let input_cost = (input_tokens as f64 / 1000.0) * entry.input_per_1k;
    let output_cost = (output_tokens as f64 / 1000.0) * entry.output_per_1k;
    input_cost + output_cost
}

/// Build the telemetry block for one evaluation.
///
/// Input tokens cover the full transcript, output tokens the evaluated
/// assistant reply, matching what the caller was billed for.
pub fn build_telemetry(
    request: &EvaluationRequest,
    pricing: &PricingTable,
    latency_ms: u64,
) -> Telemetry {
    let input_tokens = estimate_tokens(&request.transcript());
    let output_tokens = estimate_tokens(request.last_assistant().unwrap_or(""));

    let cost = match pricing.lookup(&request.model) {
        Some(entry) => Some(cost_usd(input_tokens, output_tokens, entry)),
        None => {
            tracing::warn!(
                model = %request.model,
                pricing_version = %pricing.version,
                "model not in pricing table, cost degraded"
            );
            None
        }
    };

    Telemetry {
        latency_ms,
        input_tokens,
        output_tokens,
        cost_usd: cost,
        model_used: request.model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationMessage;
    use proptest::prelude::*;

    fn request(model: &str) -> EvaluationRequest {
        EvaluationRequest::new(
            vec![
                ConversationMessage::user("What is the capital of France?"),
                ConversationMessage::assistant("The capital of France is Paris."),
            ],
            model,
        )
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("Hello, world!"), 3);
    }

    #[test]
    fn test_cost_formula() {
        let entry = PricingEntry {
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        };
        let cost = cost_usd(1000, 500, &entry);
        assert!((cost - 0.0105).abs() < 1e-12);
    }

    #[test]
    fn test_known_model_gets_cost() {
        let telemetry = build_telemetry(&request("gpt-5-mini"), &PricingTable::builtin(), 42);
        assert_eq!(telemetry.latency_ms, 42);
        assert_eq!(telemetry.model_used, "gpt-5-mini");
        assert!(telemetry.cost_usd.is_some());
        assert!(telemetry.input_tokens > telemetry.output_tokens);
    }

    #[test]
    fn test_unknown_model_degrades_cost() {
        let telemetry =
            build_telemetry(&request("unknown-model-x"), &PricingTable::builtin(), 10);
        assert_eq!(telemetry.cost_usd, None);
        assert_eq!(telemetry.model_used, "unknown-model-x");
        assert!(telemetry.input_tokens > 0);
    }

    proptest! {
        // The cost invariant from the pricing contract, within epsilon.
        #[test]
        fn prop_cost_matches_formula(
            input in 0u32..2_000_000,
            output in 0u32..2_000_000,
            pi in 0.0f64..1.0,
            po in 0.0f64..1.0,
        ) {
            let entry = PricingEntry { input_per_1k: pi, output_per_1k: po };
            let expected = (input as f64 / 1000.0) * pi + (output as f64 / 1000.0) * po;
            prop_assert!((cost_usd(input, output, &entry) - expected).abs() < 1e-9);
        }
    }
}
