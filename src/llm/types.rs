//! Chat types shared by memory, the processor and completion backends

use serde::{Deserialize, Serialize};

/// Speaker of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// Parse the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function invocation attached to an assistant message and mirrored on
/// the tool message carrying its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    /// JSON object with the call arguments, kept serialized
    pub arguments: String,
}

/// One transcript entry as held by [`crate::Memory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    /// `None` only for an assistant message carrying a function call
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
}

impl Message {
    /// Plain text message
    #[must_use]
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            function_call: None,
        }
    }

    /// Assistant message requesting a function call
    #[must_use]
    pub const fn invocation(call: FunctionCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            function_call: Some(call),
        }
    }

    /// Tool message carrying the result of `call`
    #[must_use]
    pub fn tool_result(call: FunctionCall, result: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.into()),
            function_call: Some(call),
        }
    }
}

/// Transcript entry rendered in the shape a chat-completion API expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Plain message with no function metadata
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            function_call: None,
            name: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        match (msg.role, &msg.function_call) {
            (Role::Assistant, Some(call)) => Self {
                role: Role::Assistant,
                content: String::new(),
                function_call: Some(call.clone()),
                name: None,
                tool_call_id: None,
            },
            (Role::Tool, Some(call)) => Self {
                role: Role::Tool,
                content: msg.content.clone().unwrap_or_default(),
                function_call: None,
                name: Some(call.name.clone()),
                tool_call_id: Some(call.id.clone()),
            },
            (role, _) => Self::new(role, msg.content.clone().unwrap_or_default()),
        }
    }
}

/// Function schema advertised to a function-calling model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the arguments
    pub parameters: serde_json::Value,
}

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: ToolCallFunction,
}

/// Name and serialized arguments of a requested invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Build a function tool call
    #[must_use]
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Outcome of a completion request, decided by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Final text answer
    Text(String),
    /// One or more tool invocations to service before answering
    ToolCalls(Vec<ToolCall>),
}
