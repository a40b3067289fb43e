//! Conversation transcript backed by `SQLite`
//!
//! Every append is persisted before the call returns. The first user message
//! of a conversation also names it through the completion backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{Conversation, ConversationRepo, DbPool};
use crate::llm::prompts::{TITLE_PROMPT, clean_title};
use crate::llm::{ChatMessage, Completion, CompletionBackend, FunctionCall, Message, Role};
use crate::{Error, Result};

/// Title stored when the backend cannot name a conversation
pub const PLACEHOLDER_TITLE: &str = "New conversation";

const TITLE_TEMPERATURE: f32 = 0.3;

/// Result of a tool invocation, as handed to [`Memory::add_message`] with
/// [`Role::Tool`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPayload {
    pub tool_call_id: String,
    pub name: String,
    /// JSON object, or a string holding one
    pub arguments: serde_json::Value,
    pub result: String,
}

impl ToolPayload {
    /// Serialize for [`Memory::add_message`]
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn call(&self) -> FunctionCall {
        let arguments = match &self.arguments {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        FunctionCall {
            id: self.tool_call_id.clone(),
            name: self.name.clone(),
            arguments,
        }
    }
}

/// Ordered transcript of the current conversation
pub struct Memory {
    repo: ConversationRepo,
    backend: Arc<dyn CompletionBackend>,
    conversation: Conversation,
    messages: Vec<Message>,
    titled: bool,
}

impl Memory {
    /// Start a fresh conversation
    ///
    /// # Errors
    ///
    /// Returns error if the conversation cannot be created
    pub fn new(pool: DbPool, backend: Arc<dyn CompletionBackend>) -> Result<Self> {
        let repo = ConversationRepo::new(pool);
        let conversation = repo.create()?;
        tracing::info!(conversation_id = %conversation.id, "started conversation");

        Ok(Self {
            repo,
            backend,
            conversation,
            messages: Vec::new(),
            titled: false,
        })
    }

    /// Resume the most recent conversation, or start one if none exists
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be read
    pub fn open(pool: DbPool, backend: Arc<dyn CompletionBackend>) -> Result<Self> {
        let repo = ConversationRepo::new(pool.clone());
        let Some(conversation) = repo.latest()? else {
            return Self::new(pool, backend);
        };

        let messages: Vec<Message> = repo
            .messages(&conversation.id)?
            .into_iter()
            .map(|stored| stored.message)
            .collect();
        let titled =
            conversation.title.is_some() || messages.iter().any(|m| m.role == Role::User);

        tracing::info!(
            conversation_id = %conversation.id,
            messages = messages.len(),
            "resumed conversation"
        );

        Ok(Self {
            repo,
            backend,
            conversation,
            messages,
            titled,
        })
    }

    /// Append a message and persist it
    ///
    /// A [`Role::Tool`] message takes a JSON [`ToolPayload`] and is stored as
    /// an assistant invocation followed by the tool result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolPayload`] for an unparseable tool payload,
    /// or a database error if persistence fails
    pub async fn add_message(&mut self, role: Role, content: &str) -> Result<()> {
        if role == Role::Tool {
            return self.add_tool_result(content);
        }

        let message = Message::text(role, content);
        self.repo.add_message(&self.conversation.id, &message)?;
        self.messages.push(message);

        if role == Role::User && !self.titled {
            self.titled = true;
            self.name_conversation(content).await;
        }

        Ok(())
    }

    fn add_tool_result(&mut self, payload: &str) -> Result<()> {
        let payload: ToolPayload = serde_json::from_str(payload)
            .map_err(|e| Error::InvalidToolPayload(e.to_string()))?;

        let call = payload.call();
        let pair = [
            Message::invocation(call.clone()),
            Message::tool_result(call, payload.result),
        ];

        self.repo.add_messages(&self.conversation.id, &pair)?;
        self.messages.extend(pair);
        Ok(())
    }

    async fn name_conversation(&mut self, first_message: &str) {
        let title = self.generate_title(first_message).await;

        if let Err(e) = self.repo.set_title(&self.conversation.id, &title) {
            tracing::warn!(error = %e, "failed to store conversation title");
        }
        tracing::debug!(conversation_id = %self.conversation.id, title = %title, "conversation titled");
        self.conversation.title = Some(title);
    }

    async fn generate_title(&self, first_message: &str) -> String {
        let request = [
            ChatMessage::system(TITLE_PROMPT),
            ChatMessage::user(first_message),
        ];

        match self
            .backend
            .get_completion(&request, None, TITLE_TEMPERATURE)
            .await
        {
            Ok(Completion::Text(text)) => clean_title(&text).unwrap_or_else(|| {
                tracing::warn!("title response was empty");
                PLACEHOLDER_TITLE.to_string()
            }),
            Ok(Completion::ToolCalls(_)) => {
                tracing::warn!("title request answered with tool calls");
                PLACEHOLDER_TITLE.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "title generation failed");
                PLACEHOLDER_TITLE.to_string()
            }
        }
    }

    /// Transcript rendered for a chat-completion request
    #[must_use]
    pub fn get_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ChatMessage::from).collect()
    }

    /// Raw transcript
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Begin a new conversation; earlier ones stay in storage
    ///
    /// # Errors
    ///
    /// Returns error if the conversation cannot be created
    pub fn start_new_conversation(&mut self) -> Result<()> {
        self.conversation = self.repo.create()?;
        self.messages.clear();
        self.titled = false;
        tracing::info!(conversation_id = %self.conversation.id, "started conversation");
        Ok(())
    }

    /// Same as [`Memory::start_new_conversation`]
    ///
    /// # Errors
    ///
    /// Returns error if the conversation cannot be created
    pub fn clear(&mut self) -> Result<()> {
        self.start_new_conversation()
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.conversation.title.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
