//! Factuality unit: two-stage claim verification.
//!
//! Stage 1 extracts discrete checkable claims from the reply; stage 2 runs
//! a web search per claim and asks a constrained checker whether the
//! evidence supports, contradicts, or fails to decide each one. The stages
//! are strictly sequential; claims within stage 2 verify concurrently.

use futures::future::join_all;
use jsonschema::Validator;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{AgentOutcome, FactualityPayload, UnitName};

use super::{completion, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::{CLAIM_EXTRACTION_PROMPT, CLAIM_VERDICT_PROMPT};
use crate::providers::{ChatMessage, LlmProvider};
use crate::search::SearchProvider;
use crate::structured::{compile_schema, complete_structured, StructuredError};

/// How a single claim resolved against its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Resolution {
    Supported,
    Contradicted,
    Inconclusive,
}

#[derive(Debug, Deserialize)]
struct ClaimVerdict {
    resolution: Resolution,
    #[serde(default)]
    correction: Option<String>,
}

struct ClaimCheck {
    resolution: Resolution,
    correction: Option<String>,
    sources: Vec<String>,
    /// Whether the search provider returned anything for this claim.
    searched: bool,
}

const MAX_SOURCES: usize = 10;

pub struct FactualityUnit {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    model: String,
    max_retries: usize,
    max_claims: usize,
    max_search_results: usize,
    contradiction_penalty: f64,
    degraded_score_cap: f64,
    extraction_schema: Validator,
    verdict_schema: Validator,
}

impl FactualityUnit {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        config: &RuntimeConfig,
    ) -> Self {
        let extraction_schema = compile_schema(&json!({
            "type": "object",
            "required": ["claims"],
            "properties": {
                "claims": { "type": "array", "items": { "type": "string" } }
            }
        }));
        let verdict_schema = compile_schema(&json!({
            "type": "object",
            "required": ["resolution"],
            "properties": {
                "resolution": { "enum": ["supported", "contradicted", "inconclusive"] },
                "correction": { "type": ["string", "null"] }
            }
        }));
        Self {
            provider,
            search,
            model: config.unit_model(UnitName::Factuality).to_string(),
            max_retries: config.max_retries,
            max_claims: config.max_claims,
            max_search_results: config.max_search_results,
            contradiction_penalty: config.contradiction_penalty,
            degraded_score_cap: config.degraded_score_cap,
            extraction_schema,
            verdict_schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<FactualityPayload> {
        let claims = match self.extract_claims(ctx).await {
            Ok(claims) => claims,
            Err(StructuredError::Provider(e)) => {
                tracing::warn!(error = %e, "claim extraction failed");
                return AgentOutcome::Failed {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "claim extraction returned malformed output");
                return AgentOutcome::Degraded {
                    payload: FactualityPayload::neutral(),
                    reason: format!("claim extraction invalid: {e}"),
                };
            }
        };

        // Nothing to falsify.
        if claims.is_empty() {
            return AgentOutcome::Success {
                payload: FactualityPayload::vacuous(),
            };
        }

        let checks = join_all(claims.iter().map(|claim| self.check_claim(claim))).await;
        self.score(&checks)
    }

    async fn extract_claims(&self, ctx: &UnitContext) -> Result<Vec<String>, StructuredError> {
        let messages = vec![
            ChatMessage::system(CLAIM_EXTRACTION_PROMPT),
            ChatMessage::user(ctx.last_assistant.clone()),
        ];

        let (value, _usage) = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 300),
            &self.extraction_schema,
            self.max_retries,
        )
        .await?;

        let claims = value["claims"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(str::trim)
                    .filter(|claim| !claim.is_empty())
                    .map(String::from)
                    .take(self.max_claims)
                    .collect()
            })
            .unwrap_or_default();

        Ok(claims)
    }

    async fn check_claim(&self, claim: &str) -> ClaimCheck {
        let hits = match self.search.search(claim, self.max_search_results).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(claim, error = %e, "claim search failed");
                return ClaimCheck {
                    resolution: Resolution::Inconclusive,
                    correction: None,
                    sources: Vec::new(),
                    searched: false,
                };
            }
        };

        let sources: Vec<String> = hits
            .iter()
            .filter(|hit| !hit.url.is_empty())
            .map(|hit| hit.url.clone())
            .collect();

        let evidence = hits
            .iter()
            .map(|hit| format!("- {} ({}): {}", hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            ChatMessage::system(CLAIM_VERDICT_PROMPT),
            ChatMessage::user(format!(
                "Claim:\n{claim}\n\nSearch snippets:\n{evidence}"
            )),
        ];

        let verdict = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 300),
            &self.verdict_schema,
            self.max_retries,
        )
        .await
        .and_then(|(value, _)| {
            serde_json::from_value::<ClaimVerdict>(value)
                .map_err(|e| StructuredError::Json(e.to_string()))
        });

        match verdict {
            Ok(verdict) => ClaimCheck {
                resolution: verdict.resolution,
                correction: verdict.correction,
                sources,
                searched: true,
            },
            Err(e) => {
                tracing::warn!(claim, error = %e, "claim verdict unavailable");
                ClaimCheck {
                    resolution: Resolution::Inconclusive,
                    correction: None,
                    sources,
                    searched: true,
                }
            }
        }
    }

    /// Fold per-claim resolutions into the payload. A contradicted claim
    /// both lowers the supported fraction and applies a multiplicative
    /// penalty, so a single clear contradiction lands well below the
    /// trusted range instead of averaging out.
    fn score(&self, checks: &[ClaimCheck]) -> AgentOutcome<FactualityPayload> {
        let total = checks.len() as f64;
        let contradicted = checks
            .iter()
            .filter(|c| c.resolution == Resolution::Contradicted)
            .count();
        let inconclusive = checks
            .iter()
            .filter(|c| c.resolution == Resolution::Inconclusive)
            .count();

        let not_contradicted = (total - contradicted as f64) / total;
        let score = not_contradicted * self.contradiction_penalty.powi(contradicted as i32);
        let hallucination = (contradicted as f64 + 0.5 * inconclusive as f64) / total;

        let mut sources_checked: Vec<String> = Vec::new();
        for check in checks {
            for url in &check.sources {
                if !sources_checked.contains(url) {
                    sources_checked.push(url.clone());
                }
            }
        }
        sources_checked.truncate(MAX_SOURCES);

        let corrected_facts: Vec<String> = checks
            .iter()
            .filter(|c| c.resolution == Resolution::Contradicted)
            .filter_map(|c| c.correction.clone())
            .collect();

        let mut payload = FactualityPayload {
            score,
            hallucination_likelihood: hallucination,
            corrected_facts,
            sources_checked,
            claims_checked: checks.len() as u32,
        }
        .clamped();

        let any_searched = checks.iter().any(|c| c.searched);
        if !any_searched {
            // No claim could be verified at all; cap below the trusted
            // range rather than reporting a clean bill of health.
            payload.score = payload.score.min(self.degraded_score_cap);
            return AgentOutcome::Degraded {
                payload,
                reason: "search provider unavailable, claims could not be verified".to_string(),
            };
        }

        AgentOutcome::Success { payload }
    }
}
