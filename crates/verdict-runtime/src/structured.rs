//! Structured-output handling for evaluator calls.
//!
//! LLMs produce JSON, not verdicts. Every completion goes through the same
//! gate: extract the JSON body (models love code fences), parse it, validate
//! it against the unit's schema, and retry a bounded number of times on
//! transient provider errors or malformed responses. If the gate still
//! rejects after retries, the caller downgrades to a neutral payload; it
//! never best-effort parses.

use backon::{ExponentialBuilder, Retryable};
use jsonschema::Validator;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

lazy_static! {
    static ref FENCE_RE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("Invalid fence regex");
}

/// Errors from a structured completion, after retries are exhausted.
///
/// The variant decides the outcome downgrade: `Schema`/`Json` mean the
/// provider answered but the answer is unusable (degrade with a neutral
/// payload); `Provider` means nothing usable arrived at all (fail the unit).
#[derive(Error, Debug)]
pub enum StructuredError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Response is not valid JSON: {0}")]
    Json(String),

    #[error("Response failed schema validation: {0}")]
    Schema(String),
}

impl StructuredError {
    /// Retry transient provider trouble and malformed responses; bail out
    /// immediately on auth and client-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            StructuredError::Provider(e) => e.is_transient(),
            StructuredError::Json(_) | StructuredError::Schema(_) => true,
        }
    }
}

/// Pull the JSON body out of a completion. Handles fenced blocks and
/// leading/trailing prose around a single object.
pub fn extract_json(content: &str) -> &str {
    if let Some(caps) = FENCE_RE.captures(content) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim();
        }
    }
    let trimmed = content.trim();
    if !trimmed.starts_with('{') {
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return &trimmed[start..=end];
            }
        }
    }
    trimmed
}

/// Compile a unit's response schema. Schemas are static code, so a compile
/// failure is a programming error.
pub fn compile_schema(schema: &Value) -> Validator {
    jsonschema::validator_for(schema).expect("Invalid unit response schema")
}

/// Run one schema-validated completion with bounded retries.
///
/// Returns the validated JSON value and the token usage accumulated across
/// every attempt (failed attempts still cost tokens).
pub async fn complete_structured(
    provider: &dyn LlmProvider,
    messages: &[ChatMessage],
    config: &CompletionConfig,
    schema: &Validator,
    max_retries: usize,
) -> Result<(Value, TokenUsage), StructuredError> {
    let usage = Mutex::new(TokenUsage::default());

    let attempt = || async {
        let response = provider.complete(messages.to_vec(), config).await?;
        usage.lock().absorb(&response.usage);

        let raw = extract_json(&response.content);
        let value: Value =
            serde_json::from_str(raw).map_err(|e| StructuredError::Json(e.to_string()))?;

        if !schema.is_valid(&value) {
            let detail = schema
                .iter_errors(&value)
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StructuredError::Schema(detail));
        }

        Ok(value)
    };

    let value = attempt
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(200))
                .with_max_times(max_retries),
        )
        .when(StructuredError::is_retryable)
        .await?;

    let total = *usage.lock();
    Ok((value, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CompletionResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SequenceProvider {
        replies: Vec<Result<String, ProviderError>>,
        calls: AtomicUsize,
    }

    impl SequenceProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for SequenceProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .get(index)
                .unwrap_or_else(|| self.replies.last().unwrap());
            match reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    usage: TokenUsage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                    },
                    model: config.model.clone(),
                }),
                Err(ProviderError::Auth) => Err(ProviderError::Auth),
                Err(e) => Err(ProviderError::Http(e.to_string())),
            }
        }

        fn name(&self) -> &str {
            "sequence"
        }
    }

    fn score_schema() -> Validator {
        compile_schema(&json!({
            "type": "object",
            "required": ["score"],
            "properties": { "score": { "type": "number" } }
        }))
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let content = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(content), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let content = "Sure! {\"a\": 1} hope that helps";
        assert_eq!(extract_json(content), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_valid_response_first_try() {
        let provider = SequenceProvider::new(vec![Ok(r#"{"score": 0.9}"#.to_string())]);
        let schema = score_schema();
        let (value, usage) = complete_structured(
            &provider,
            &[ChatMessage::user("judge")],
            &CompletionConfig::default(),
            &schema,
            2,
        )
        .await
        .unwrap();
        assert_eq!(value["score"], 0.9);
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_retries() {
        let provider = SequenceProvider::new(vec![
            Ok("not json at all".to_string()),
            Ok(r#"{"wrong_field": true}"#.to_string()),
            Ok(r#"{"score": 0.4}"#.to_string()),
        ]);
        let schema = score_schema();
        let (value, usage) = complete_structured(
            &provider,
            &[ChatMessage::user("judge")],
            &CompletionConfig::default(),
            &schema,
            2,
        )
        .await
        .unwrap();
        assert_eq!(value["score"], 0.4);
        assert_eq!(provider.call_count(), 3);
        // Usage accumulates across all attempts.
        assert_eq!(usage.prompt_tokens, 30);
    }

    #[tokio::test]
    async fn test_schema_invalid_after_retries() {
        let provider = SequenceProvider::new(vec![Ok(r#"{"wrong": 1}"#.to_string())]);
        let schema = score_schema();
        let result = complete_structured(
            &provider,
            &[ChatMessage::user("judge")],
            &CompletionConfig::default(),
            &schema,
            2,
        )
        .await;
        assert!(matches!(result, Err(StructuredError::Schema(_))));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let provider = SequenceProvider::new(vec![Err(ProviderError::Auth)]);
        let schema = score_schema();
        let result = complete_structured(
            &provider,
            &[ChatMessage::user("judge")],
            &CompletionConfig::default(),
            &schema,
            2,
        )
        .await;
        assert!(matches!(
            result,
            Err(StructuredError::Provider(ProviderError::Auth))
        ));
        assert_eq!(provider.call_count(), 1);
    }
}
