//! Tools the assistant can invoke through function calling
//!
//! A [`Tool`] pairs a [`ToolHandler`] with its name, description and an
//! explicit parameter schema. Tools are collected in a [`ToolRegistry`]
//! built once at startup.

mod registry;
pub mod search;
pub mod visit;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::llm::ToolFunction;

pub use registry::{FnSource, ToolRegistry, ToolSource, builtin_sources};

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Map a declared type name to a JSON type
    ///
    /// The mapping is total: unrecognized names become [`ParamType::String`].
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "float" | "double" | "number" | "i32" | "i64" | "u32" | "u64"
            | "usize" | "f32" | "f64" => Self::Number,
            "bool" | "boolean" => Self::Boolean,
            "dict" | "map" | "mapping" | "object" | "hashmap" => Self::Object,
            "list" | "array" | "sequence" | "vec" | "tuple" => Self::Array,
            _ => Self::String,
        }
    }

    /// JSON Schema type keyword
    #[must_use]
    pub const fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Declared parameter of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParam {
    pub name: String,
    pub kind: ParamType,
    /// Value used when the caller omits the parameter; required iff `None`
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ToolParam {
    /// A parameter the caller must supply
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            description: None,
        }
    }

    /// A parameter filled with `default` when omitted
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default.into()),
            description: None,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Errors raised while invoking a tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments missing, unparseable, or of the wrong type
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The handler ran and failed
    #[error("{0}")]
    Failed(String),

    /// The handler did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Named arguments passed to a tool handler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Parse a JSON object; an empty string counts as no arguments
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if `raw` is not a JSON object
    pub fn from_json(raw: &str) -> Result<Self, ToolError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(Value::Null) => Ok(Self::default()),
            Ok(other) => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// String argument
    ///
    /// # Errors
    ///
    /// Returns error if the argument is missing or not a string
    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be a string")))
    }

    /// Numeric argument, accepting numeric strings
    ///
    /// # Errors
    ///
    /// Returns error if the argument is missing or not a number
    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        match self.get(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be a number")))
    }

    /// Boolean argument, accepting `"true"`/`"false"`
    ///
    /// # Errors
    ///
    /// Returns error if the argument is missing or not a boolean
    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        match self.get(name) {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be a boolean")))
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Behavior behind a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Documentation text, used as the description when none is given
    fn doc(&self) -> &str {
        ""
    }

    /// Declared parameters
    fn params(&self) -> Vec<ToolParam>;

    /// Run the tool with arguments already completed with defaults
    ///
    /// # Errors
    ///
    /// Returns error if the arguments are unusable or the tool fails
    async fn call(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Handler backed by a synchronous closure
struct FnHandler<F> {
    doc: String,
    params: Vec<ToolParam>,
    func: F,
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(ToolArgs) -> Result<String, ToolError> + Send + Sync,
{
    fn doc(&self) -> &str {
        &self.doc
    }

    fn params(&self) -> Vec<ToolParam> {
        self.params.clone()
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        (self.func)(args)
    }
}

/// A named, invocable tool
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    params: Vec<ToolParam>,
    handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Tool {
    /// Create a tool whose description is the handler's documentation
    pub fn new(name: impl Into<String>, handler: impl ToolHandler + 'static) -> Self {
        let description = handler.doc().trim().to_string();
        let params = handler.params();
        Self {
            name: name.into(),
            description,
            params,
            handler: Arc::new(handler),
        }
    }

    /// Create a tool from a synchronous closure
    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ToolParam>,
        func: F,
    ) -> Self
    where
        F: Fn(ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self::new(
            name,
            FnHandler {
                doc: description.into(),
                params,
                func,
            },
        )
    }

    /// Replace the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn params(&self) -> &[ToolParam] {
        &self.params
    }

    /// Invoke the handler, filling defaults for omitted optional parameters
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if a required parameter is
    /// missing, or whatever the handler returns
    pub async fn invoke(&self, mut args: ToolArgs) -> Result<String, ToolError> {
        for param in &self.params {
            if args.get(&param.name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            match &param.default {
                Some(default) => args.insert(param.name.clone(), default.clone()),
                None => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
            }
        }

        self.handler.call(args).await
    }

    /// Function-calling schema for this tool
    #[must_use]
    pub fn to_schema(&self) -> ToolFunction {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(param.kind.json_type()));
            if let Some(description) = &param.description {
                prop.insert("description".to_string(), json!(description));
            }
            if let Some(default) = &param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.is_required() {
                required.push(param.name.clone());
            }
        }

        ToolFunction {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}
