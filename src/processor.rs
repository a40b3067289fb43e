//! Conversation turn processing with tool dispatch
//!
//! One call to [`LlmProcessor::process_input`] runs a full turn: the user
//! message is recorded, the backend is asked for a completion, requested
//! tools are run, and the final answer is recorded and returned. Only
//! transport and storage errors escape; tool problems become spoken text.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::prompts::system_prompt;
use crate::llm::{Completion, CompletionBackend, Role, ToolCall, ToolFunction};
use crate::memory::{Memory, ToolPayload};
use crate::tools::{ToolArgs, ToolError, ToolRegistry};
use crate::Result;

/// Reply when the model asks for tools a second time in one turn
pub const TOO_MANY_STEPS: &str = "I need more steps to answer that than I can take right now.";

/// Per-processor settings
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub ai_name: String,
    pub user_name: Option<String>,
    pub temperature: f32,
    pub tool_timeout: Duration,
    /// Durable user facts included in the system prompt
    pub facts: Vec<String>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            ai_name: "Camille".to_string(),
            user_name: None,
            temperature: 0.7,
            tool_timeout: Duration::from_secs(30),
            facts: Vec::new(),
        }
    }
}

impl ProcessorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            ai_name: config.ai_name.clone(),
            user_name: config.user_name.clone(),
            temperature: config.llm.temperature,
            tool_timeout: config.tools.timeout,
            facts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_facts(mut self, facts: Vec<String>) -> Self {
        self.facts = facts;
        self
    }

    fn system_prompt(&self) -> String {
        system_prompt(&self.ai_name, self.user_name.as_deref(), &self.facts)
    }
}

/// Outcome of servicing a batch of tool calls
enum Dispatch {
    /// Every call succeeded and its result is in memory
    Completed,
    /// Dispatch stopped; the text is the turn's reply
    Stopped(String),
}

/// Runs conversation turns against a completion backend
pub struct LlmProcessor {
    memory: Memory,
    backend: Arc<dyn CompletionBackend>,
    tools: Arc<ToolRegistry>,
    settings: ProcessorSettings,
}

impl LlmProcessor {
    /// Create a processor, seeding the system prompt into an empty transcript
    ///
    /// # Errors
    ///
    /// Returns error if the system prompt cannot be persisted
    pub async fn new(
        memory: Memory,
        backend: Arc<dyn CompletionBackend>,
        tools: Arc<ToolRegistry>,
        settings: ProcessorSettings,
    ) -> Result<Self> {
        let mut processor = Self {
            memory,
            backend,
            tools,
            settings,
        };
        if processor.memory.is_empty() {
            processor.seed_system_prompt().await?;
        }
        Ok(processor)
    }

    async fn seed_system_prompt(&mut self) -> Result<()> {
        let prompt = self.settings.system_prompt();
        self.memory.add_message(Role::System, &prompt).await
    }

    /// Run one conversation turn and return the reply
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or answers with a
    /// non-success status, or if the transcript cannot be persisted
    pub async fn process_input(&mut self, text: &str) -> Result<String> {
        self.memory.add_message(Role::User, text).await?;

        let schemas = self.tools.schemas();
        let reply = match self.complete(&schemas).await? {
            Completion::Text(text) => text,
            Completion::ToolCalls(calls) => match self.dispatch(&calls).await? {
                Dispatch::Stopped(reply) => reply,
                Dispatch::Completed => match self.complete(&schemas).await? {
                    Completion::Text(text) => text,
                    Completion::ToolCalls(more) => {
                        tracing::warn!(
                            requested = more.len(),
                            "model requested a second round of tools"
                        );
                        TOO_MANY_STEPS.to_string()
                    }
                },
            },
        };

        self.memory.add_message(Role::Assistant, &reply).await?;
        Ok(reply)
    }

    async fn complete(&self, schemas: &[ToolFunction]) -> Result<Completion> {
        let tools = (!schemas.is_empty()).then_some(schemas);
        self.backend
            .get_completion(&self.memory.get_messages(), tools, self.settings.temperature)
            .await
    }

    async fn dispatch(&mut self, calls: &[ToolCall]) -> Result<Dispatch> {
        for call in calls {
            let name = call.function.name.as_str();

            let Some(tool) = self.tools.get(name) else {
                tracing::warn!(tool = name, "model requested an unknown tool");
                return Ok(Dispatch::Stopped(format!(
                    "I'm sorry, I don't have a tool called '{name}'."
                )));
            };

            let args = match ToolArgs::from_json(&call.function.arguments) {
                Ok(args) => args,
                Err(e) => return Ok(Dispatch::Stopped(tool_failure(name, &e))),
            };

            tracing::info!(tool = name, call_id = %call.id, "invoking tool");
            let outcome =
                match tokio::time::timeout(self.settings.tool_timeout, tool.invoke(args)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ToolError::Timeout(self.settings.tool_timeout)),
                };

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "tool failed");
                    return Ok(Dispatch::Stopped(tool_failure(name, &e)));
                }
            };

            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));
            let payload = ToolPayload {
                tool_call_id: call.id.clone(),
                name: name.to_string(),
                arguments,
                result,
            };
            self.memory
                .add_message(Role::Tool, &payload.to_json()?)
                .await?;
        }

        Ok(Dispatch::Completed)
    }

    /// Start a new conversation and seed it with the system prompt
    ///
    /// # Errors
    ///
    /// Returns error if the conversation cannot be created or persisted
    pub async fn clear_memory(&mut self) -> Result<()> {
        self.memory.clear()?;
        self.seed_system_prompt().await
    }

    /// Replace the user facts used in future system prompts
    pub fn set_facts(&mut self, facts: Vec<String>) {
        self.settings.facts = facts;
    }

    /// Replace the name used to address the user
    pub fn set_user_name(&mut self, name: Option<String>) {
        self.settings.user_name = name;
    }

    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

fn tool_failure(name: &str, error: &ToolError) -> String {
    format!("Sorry, the {name} tool failed: {error}")
}
