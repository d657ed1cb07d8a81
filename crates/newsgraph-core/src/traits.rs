use crate::error::Result;
use crate::types::{DirectoryLink, EntityType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of one turn in a chat-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single chat-completion call. The seam deliberately exposes only what
/// every phase needs (spec.md §4.3: "the pipeline treats the LLM as one
/// opaque chat-completion service") — no tool-calling, no streaming.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// Implemented by the concrete LLM transport. Living in core lets
/// `newsgraph-pipeline` depend on the abstraction without depending on the
/// HTTP crate that implements it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Implemented by the concrete directory/storage transport (spec.md §4.4).
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Returns the best matching existing entity above the configured
    /// similarity threshold, or `None` when nothing qualifies (the entity is
    /// treated as new).
    async fn find_similar_entity(
        &self,
        surface_text: &str,
        entity_type: EntityType,
    ) -> Result<Option<DirectoryLink>>;

    /// Atomically persists one fully-assembled article payload. Must not
    /// write a partial graph on failure (spec.md §4.9/§4.4: "all-or-nothing").
    async fn atomic_insert_article(&self, payload: &serde_json::Value) -> Result<()>;

    /// Atomically persists one fully-assembled fragment payload.
    async fn atomic_insert_fragment(&self, payload: &serde_json::Value) -> Result<()>;

    /// Cheap reachability probe used by `GET /health` (ambient, not a
    /// spec.md operation in its own right).
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_helpers_set_expected_roles() {
        assert_eq!(ChatMessage::system("x").role, ChatRole::System);
        assert_eq!(ChatMessage::user("x").role, ChatRole::User);
    }
}
