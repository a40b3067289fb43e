//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use camille::llm::prompts::TITLE_PROMPT;
use camille::llm::{ChatMessage, Completion, CompletionBackend, ToolCall, ToolFunction};
use camille::tools::{ParamType, Tool, ToolError, ToolHandler, ToolParam};
use camille::{DbPool, Error, Result, db};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// A completion request as seen by the backend
#[derive(Debug, Clone)]
pub struct Request {
    pub messages: Vec<ChatMessage>,
    pub tools: Option<Vec<ToolFunction>>,
    pub temperature: f32,
}

/// Backend that replays scripted completions
///
/// Title requests are answered separately so scripts only cover turns.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<Request>>,
    title: Option<String>,
    title_requests: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Completion>) -> Arc<Self> {
        Self::with_title(script, Some("Test conversation"))
    }

    /// `None` makes every title request fail
    pub fn with_title(script: Vec<Completion>, title: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            title: title.map(String::from),
            title_requests: Mutex::new(0),
        })
    }

    /// Turn requests received so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn title_requests(&self) -> usize {
        *self.title_requests.lock().unwrap()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolFunction]>,
        temperature: f32,
    ) -> Result<Completion> {
        if messages.first().is_some_and(|m| m.content == TITLE_PROMPT) {
            *self.title_requests.lock().unwrap() += 1;
            return self.title.clone().map(Completion::Text).ok_or(Error::Api {
                status: 503,
                body: "title service unavailable".to_string(),
            });
        }

        self.requests.lock().unwrap().push(Request {
            messages: messages.to_vec(),
            tools: tools.map(<[ToolFunction]>::to_vec),
            temperature,
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::MalformedResponse("script exhausted".to_string()))
    }
}

/// A tool call as the model would emit it
pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> Completion {
    Completion::ToolCalls(vec![ToolCall::function(id, name, arguments.to_string())])
}

pub fn text(reply: &str) -> Completion {
    Completion::Text(reply.to_string())
}

/// Weather tool with canned output
pub fn fake_weather() -> Tool {
    Tool::from_fn(
        "get_weather",
        "Get the current weather for a specific city.",
        vec![ToolParam::required("city", ParamType::String)],
        |args| {
            let city = args.str("city")?;
            Ok(format!("{{\"city\": \"{city}\", \"temp_c\": 18, \"sky\": \"clear\"}}"))
        },
    )
}

/// Weather tool that counts its invocations
pub fn counting_weather(calls: Arc<AtomicUsize>) -> Tool {
    Tool::from_fn(
        "get_weather",
        "Get the current weather for a specific city.",
        vec![ToolParam::required("city", ParamType::String)],
        move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("18°C and clear in {}", args.str("city")?))
        },
    )
}

/// Tool that always fails
pub fn failing_tool() -> Tool {
    Tool::from_fn("explode", "Always fails.", Vec::new(), |_| {
        Err(ToolError::Failed("boom".to_string()))
    })
}

/// Tool that outlives any reasonable timeout
pub struct SlowHandler;

#[async_trait]
impl ToolHandler for SlowHandler {
    fn doc(&self) -> &str {
        "Takes its time."
    }

    fn params(&self) -> Vec<ToolParam> {
        Vec::new()
    }

    async fn call(&self, _args: camille::tools::ToolArgs) -> std::result::Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!({"done": true}).to_string())
    }
}

pub fn slow_tool() -> Tool {
    Tool::new("slow", SlowHandler)
}

/// Speaker that records phrases instead of playing them
#[derive(Default)]
pub struct RecordingSpeaker {
    said: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn said(&self) -> Vec<String> {
        self.said.lock().unwrap().clone()
    }
}

#[async_trait]
impl camille::voice::Speaker for RecordingSpeaker {
    async fn say(&self, text: &str) -> Result<()> {
        self.said.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
