//! SOP compliance unit: every loaded rule is checked against the response
//! by a constrained semantic checker.

use futures::future::join_all;
use jsonschema::Validator;
use serde_json::json;
use std::sync::Arc;

use verdict_core::{
    severity_summary, sort_violations, AgentOutcome, SopCompliancePayload, SopRule, SopViolation,
    UnitName,
};

use super::{completion, UnitContext};
use crate::config::RuntimeConfig;
use crate::prompts::SOP_CHECK_PROMPT;
use crate::providers::{ChatMessage, LlmProvider};
use crate::registry::SharedRules;
use crate::structured::{compile_schema, complete_structured, StructuredError};

pub struct SopUnit {
    provider: Arc<dyn LlmProvider>,
    rules: Arc<SharedRules>,
    model: String,
    max_retries: usize,
    schema: Validator,
}

impl SopUnit {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        rules: Arc<SharedRules>,
        config: &RuntimeConfig,
    ) -> Self {
        let schema = compile_schema(&json!({
            "type": "object",
            "required": ["holds"],
            "properties": {
                "holds": { "type": "boolean" },
                "explanation": { "type": "string" }
            }
        }));
        Self {
            provider,
            rules,
            model: config.unit_model(UnitName::SopCompliance).to_string(),
            max_retries: config.max_retries,
            schema,
        }
    }

    pub async fn evaluate(&self, ctx: &UnitContext) -> AgentOutcome<SopCompliancePayload> {
        // Pin one rule-set snapshot for the whole call; a concurrent reload
        // never splits an evaluation across two rule sets.
        let rules = self.rules.snapshot();
        if rules.is_empty() {
            return AgentOutcome::Success {
                payload: SopCompliancePayload::vacuous(),
            };
        }

        let checks = join_all(rules.rules.iter().map(|rule| self.check_rule(rule, ctx))).await;

        let mut violations: Vec<SopViolation> = Vec::new();
        let mut unverifiable: Vec<String> = Vec::new();

        for (rule, result) in rules.rules.iter().zip(checks) {
            match result {
                Ok(None) => {}
                Ok(Some(violation)) => violations.push(violation),
                Err(e) => {
                    // A rule the checker could not judge is never silently
                    // compliant.
                    tracing::warn!(rule_id = %rule.id, error = %e, "rule check unavailable");
                    unverifiable.push(rule.id.clone());
                }
            }
        }

        sort_violations(&mut violations);
        let summary = severity_summary(&violations);
        let compliant = violations.is_empty();

        let payload = SopCompliancePayload {
            compliant,
            violations,
            severity_summary: summary,
            unverifiable_rules: unverifiable.clone(),
        };

        if unverifiable.is_empty() {
            AgentOutcome::Success { payload }
        } else {
            AgentOutcome::Degraded {
                payload,
                reason: format!("unable to verify rules: {}", unverifiable.join(", ")),
            }
        }
    }

    /// Check one rule. `Ok(None)` means the rule holds.
    async fn check_rule(
        &self,
        rule: &SopRule,
        ctx: &UnitContext,
    ) -> Result<Option<SopViolation>, StructuredError> {
        let messages = vec![
            ChatMessage::system(SOP_CHECK_PROMPT),
            ChatMessage::user(format!(
                "Rule {} ({}), severity {}:\n{}\n\nConversation:\n{}",
                rule.id,
                rule.name,
                rule.severity.as_str(),
                rule.description,
                ctx.transcript
            )),
        ];

        let (value, _usage) = complete_structured(
            self.provider.as_ref(),
            &messages,
            &completion(&self.model, 300),
            &self.schema,
            self.max_retries,
        )
        .await?;

        let holds = value["holds"].as_bool().unwrap_or(true);
        if holds {
            return Ok(None);
        }

        let description = value["explanation"]
            .as_str()
            .unwrap_or("rule violated")
            .to_string();

        Ok(Some(SopViolation {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: rule.severity,
            description,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionConfig, CompletionResponse, ProviderError, TokenUsage};
    use crate::units::testing::context;
    use async_trait::async_trait;
    use verdict_core::{RuleSet, Severity};

    /// Answers rule checks by rule id embedded in the user message.
    struct RuleCheckProvider {
        violated: Vec<&'static str>,
        unreachable: Vec<&'static str>,
    }

    #[async_trait]
    impl crate::providers::LlmProvider for RuleCheckProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let body = &messages[1].content;
            if self.unreachable.iter().any(|id| body.contains(id)) {
                return Err(ProviderError::Api {
                    status: 400,
                    message: "bad request".to_string(),
                });
            }
            let violated = self.violated.iter().any(|id| body.contains(id));
            let content = if violated {
                serde_json::json!({
                    "holds": false,
                    "explanation": "response breaks this rule"
                })
            } else {
                serde_json::json!({ "holds": true, "explanation": "fine" })
            };
            Ok(CompletionResponse {
                content: content.to_string(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
            })
        }

        fn name(&self) -> &str {
            "rule-check"
        }
    }

    fn rule(id: &str, severity: Severity) -> SopRule {
        SopRule {
            id: id.to_string(),
            name: format!("rule {id}"),
            description: format!("description of {id}"),
            severity,
        }
    }

    fn rule_set(rules: Vec<SopRule>) -> Arc<SharedRules> {
        Arc::new(SharedRules::new(RuleSet {
            version: "test".to_string(),
            rules,
        }))
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_rule_set_is_vacuously_compliant() {
        let provider = Arc::new(RuleCheckProvider {
            violated: vec![],
            unreachable: vec![],
        });
        let unit = SopUnit::new(provider, rule_set(vec![]), &config());
        let outcome = unit.evaluate(&context("q", "a")).await;
        assert!(outcome.is_success());
        assert!(outcome.payload().unwrap().compliant);
    }

    #[tokio::test]
    async fn test_violations_sorted_severity_desc_then_id_asc() {
        let provider = Arc::new(RuleCheckProvider {
            violated: vec!["SOP-001", "SOP-002", "SOP-004"],
            unreachable: vec![],
        });
        let rules = rule_set(vec![
            rule("SOP-001", Severity::High),
            rule("SOP-002", Severity::Critical),
            rule("SOP-003", Severity::Low),
            rule("SOP-004", Severity::High),
        ]);
        let unit = SopUnit::new(provider, rules, &config());
        let outcome = unit.evaluate(&context("q", "a")).await;

        let payload = outcome.payload().unwrap();
        assert!(outcome.is_success());
        assert!(!payload.compliant);
        let ids: Vec<&str> = payload
            .violations
            .iter()
            .map(|v| v.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["SOP-002", "SOP-001", "SOP-004"]);
        assert_eq!(payload.severity_summary.get(&Severity::High), Some(&2));
    }

    #[tokio::test]
    async fn test_determinism_same_input_same_order() {
        for _ in 0..3 {
            let provider = Arc::new(RuleCheckProvider {
                violated: vec!["SOP-001", "SOP-002"],
                unreachable: vec![],
            });
            let rules = rule_set(vec![
                rule("SOP-002", Severity::Medium),
                rule("SOP-001", Severity::Medium),
            ]);
            let unit = SopUnit::new(provider, rules, &config());
            let outcome = unit.evaluate(&context("q", "a")).await;
            let ids: Vec<String> = outcome
                .payload()
                .unwrap()
                .violations
                .iter()
                .map(|v| v.rule_id.clone())
                .collect();
            assert_eq!(ids, vec!["SOP-001", "SOP-002"]);
        }
    }

    #[tokio::test]
    async fn test_unreachable_rule_degrades_and_is_listed() {
        let provider = Arc::new(RuleCheckProvider {
            violated: vec![],
            unreachable: vec!["SOP-002"],
        });
        let rules = rule_set(vec![
            rule("SOP-001", Severity::Low),
            rule("SOP-002", Severity::High),
        ]);
        let unit = SopUnit::new(provider, rules, &config());
        let outcome = unit.evaluate(&context("q", "a")).await;

        assert!(matches!(outcome, AgentOutcome::Degraded { .. }));
        let payload = outcome.payload().unwrap();
        assert_eq!(payload.unverifiable_rules, vec!["SOP-002"]);
        assert!(outcome.reason().unwrap().contains("SOP-002"));
    }
}
