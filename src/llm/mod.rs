//! Completion backends and chat message types

mod openai;
pub mod prompts;
mod types;

use async_trait::async_trait;

use crate::Result;

pub use openai::OpenAiClient;
pub use types::{
    ChatMessage, Completion, FunctionCall, Message, Role, ToolCall, ToolCallFunction, ToolFunction,
};

/// A chat-completion backend
///
/// Implementations decide whether a response is a final text answer or a
/// request for tool invocations; callers only match on [`Completion`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Request a completion for `messages`, advertising `tools` when given
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status, or a
    /// response that carries neither text nor tool calls
    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolFunction]>,
        temperature: f32,
    ) -> Result<Completion>;
}
