//! Conversation types and request validation.
//!
//! The evaluated object is always one conversational turn: the caller's
//! messages plus the model reply under review. Validation happens once,
//! before any unit is dispatched; everything downstream may assume a
//! well-formed request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Uppercase label used when rendering transcripts for evaluator prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// A single message in a conversation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why a request was rejected before dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Conversation is empty")]
    Empty,

    #[error("Conversation has no user message")]
    MissingUserMessage,

    #[error("Conversation has no assistant message")]
    MissingAssistantMessage,

    #[error("Model identifier is blank")]
    BlankModel,
}

/// One evaluation request: the conversation, the model that produced it,
/// and an optional caller-side session tag.
///
/// Owned by the caller for the duration of one `evaluate()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub messages: Vec<ConversationMessage>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl EvaluationRequest {
    pub fn new(messages: Vec<ConversationMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Check the structural invariants: non-empty conversation with at least
    /// one user and one assistant message, and a non-blank model identifier.
    ///
    /// This is the only condition that fails an evaluation call outright.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.messages.is_empty() {
            return Err(RequestError::Empty);
        }
        if !self.messages.iter().any(|m| m.role == Role::User) {
            return Err(RequestError::MissingUserMessage);
        }
        if !self.messages.iter().any(|m| m.role == Role::Assistant) {
            return Err(RequestError::MissingAssistantMessage);
        }
        if self.model.trim().is_empty() {
            return Err(RequestError::BlankModel);
        }
        Ok(())
    }

    /// Canonical transcript rendering handed to evaluator prompts.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The reply under evaluation: the last assistant message.
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// The prompt that produced the reply: the last user message.
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}
