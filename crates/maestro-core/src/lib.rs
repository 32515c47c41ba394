//! Core types and error definitions for the Maestro library.
//!
//! This crate provides the foundational types shared across all Maestro
//! crates: error handling and the chat message types exchanged with backend
//! services.
//!
//! # Main types
//!
//! - [`MaestroError`] — Unified error enum for all Maestro subsystems.
//! - [`MaestroResult`] — Convenience alias for `Result<T, MaestroError>`.
//! - [`Role`] — Message role (user, assistant, system, tool).
//! - [`ChatMessage`] — A single message within a chat request.
//! - [`ChatRequest`] — An ordered list of messages sent to a backend service.
//! - [`ChatResponse`] — The response returned by a backend service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the Maestro library.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum MaestroError {
    /// An error originating from workflow lifecycle management.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An error raised by a task during validation or execution.
    #[error("Task error: {0}")]
    Task(String),

    /// An error from the service registry or router.
    #[error("Routing error: {0}")]
    Routing(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;

// --- Message types ---

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system-level instruction or prompt.
    System,
    /// Output produced by a tool invocation.
    Tool,
}

/// A single message within a [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A request dispatched to a backend service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Unique identifier for this request.
    pub id: Uuid,
    /// The ordered message history to send.
    pub messages: Vec<ChatMessage>,
    /// UTC timestamp of when the request was created.
    pub created_at: DateTime<Utc>,
}

impl ChatRequest {
    /// Creates a request from an ordered list of messages.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages,
            created_at: Utc::now(),
        }
    }

    /// Creates a request holding a single user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(content)])
    }

    /// All message contents joined with a single space.
    ///
    /// This is the canonical prompt text used for token estimation and
    /// conflict logging.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The response returned by a backend service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The textual content of the response.
    pub content: String,
    /// The model that produced the response, when reported by the backend.
    pub model: Option<String>,
}

impl ChatResponse {
    /// Creates a response with the given content and no model attribution.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }

    /// Attaches the producing model's identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
