//! Language model boundary.
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSection {
    pub role: Role,
    pub content: String,
}

impl PromptSection {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

/// A chat-style completion backend.
///
/// Implementations own their retry policy for transient failures; callers
/// treat any `Err` as final.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &[PromptSection]) -> Result<String, ModelError>;

    /// A plain string prompt is one `user` section.
    async fn complete_text(&self, prompt: &str) -> Result<String, ModelError> {
        self.complete(&[PromptSection::user(prompt)]).await
    }

    /// Model identifier, for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<M> {
    async fn complete(&self, prompt: &[PromptSection]) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
