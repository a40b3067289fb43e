//! Conversation turn tests
//!
//! Drive `LlmProcessor` against a scripted backend and check both the reply
//! and what ends up in the transcript.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use camille::llm::{Completion, CompletionBackend, Role, ToolCall};
use camille::processor::TOO_MANY_STEPS;
use camille::tools::{ParamType, Tool, ToolParam};
use camille::{LlmProcessor, Memory, ProcessorSettings, ToolRegistry};

mod common;

use common::{ScriptedBackend, call, setup_test_db, text};

const WEATHER_REPORT: &str = "The weather in Paris is 18°C with clear sky. Humidity is 60%.";

fn paris_weather() -> Tool {
    Tool::from_fn(
        "get_weather",
        "Get the current weather for a specific city.",
        vec![ToolParam::required("city", ParamType::String)],
        |args| {
            assert_eq!(args.str("city")?, "Paris");
            Ok(WEATHER_REPORT.to_string())
        },
    )
}

fn registry(tools: Vec<Tool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

async fn processor(
    backend: &Arc<ScriptedBackend>,
    tools: ToolRegistry,
    settings: ProcessorSettings,
) -> LlmProcessor {
    let backend: Arc<dyn CompletionBackend> = backend.clone();
    let memory = Memory::new(setup_test_db(), Arc::clone(&backend)).unwrap();
    LlmProcessor::new(memory, backend, Arc::new(tools), settings)
        .await
        .unwrap()
}

fn roles(processor: &LlmProcessor) -> Vec<Role> {
    processor.memory().messages().iter().map(|m| m.role).collect()
}

#[tokio::test]
async fn test_system_prompt_seeded() {
    let backend = ScriptedBackend::new(Vec::new());
    let settings = ProcessorSettings {
        user_name: Some("Ada".to_string()),
        ..ProcessorSettings::default()
    }
    .with_facts(vec!["I live in Paris".to_string()]);

    let processor = processor(&backend, ToolRegistry::new(), settings).await;

    let messages = processor.memory().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::System);

    let prompt = messages[0].content.as_deref().unwrap();
    assert!(prompt.starts_with("Your name is Camille"));
    assert!(prompt.contains("Ada"));
    assert!(prompt.contains("- I live in Paris"));
}

#[tokio::test]
async fn test_plain_reply_appends_user_and_assistant() {
    let backend = ScriptedBackend::new(vec![text("Doing great, thanks!")]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("How are you today?").await.unwrap();

    assert_eq!(reply, "Doing great, thanks!");
    assert_eq!(roles(&processor), vec![Role::System, Role::User, Role::Assistant]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let tools = requests[0].tools.as_ref().unwrap();
    assert_eq!(tools[0].name, "get_weather");
    assert!((requests[0].temperature - 0.7).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_empty_registry_sends_no_tools() {
    let backend = ScriptedBackend::new(vec![text("Hi!")]);
    let mut processor = processor(&backend, ToolRegistry::new(), ProcessorSettings::default()).await;

    processor.process_input("Hello there").await.unwrap();

    assert!(backend.requests()[0].tools.is_none());
}

#[tokio::test]
async fn test_unknown_tool_apologizes() {
    let backend = ScriptedBackend::new(vec![call("call_1", "foo", json!({}))]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Do the foo thing").await.unwrap();

    assert!(reply.contains("foo"));
    assert_eq!(roles(&processor), vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_weather_in_paris() {
    let backend = ScriptedBackend::new(vec![
        call("call_1", "get_weather", json!({"city": "Paris"})),
        text("It's 18°C and clear in Paris right now."),
    ]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor
        .process_input("What's the weather in Paris?")
        .await
        .unwrap();

    assert_eq!(reply, "It's 18°C and clear in Paris right now.");
    assert_eq!(
        roles(&processor),
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    let messages = processor.memory().messages();
    let invocation = messages[2].function_call.as_ref().unwrap();
    assert_eq!(invocation.name, "get_weather");
    assert!(messages[2].content.is_none());
    assert_eq!(messages[3].content.as_deref(), Some(WEATHER_REPORT));
    assert_eq!(messages[3].function_call.as_ref().unwrap().id, invocation.id);
    assert_eq!(messages[4].content.as_deref(), Some(reply.as_str()));

    // second round sees the tool result
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.content, WEATHER_REPORT);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn test_second_tool_round_is_refused() {
    let backend = ScriptedBackend::new(vec![
        call("call_1", "get_weather", json!({"city": "Paris"})),
        call("call_2", "get_weather", json!({"city": "Paris"})),
    ]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Weather in Paris twice?").await.unwrap();

    assert_eq!(reply, TOO_MANY_STEPS);
    assert_eq!(processor.memory().messages().last().unwrap().role, Role::Assistant);
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_batch_stops_at_first_failing_call() {
    let weather_calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend::new(vec![Completion::ToolCalls(vec![
        ToolCall::function("call_1", "get_weather", r#"{"city": "Paris"}"#),
        ToolCall::function("call_2", "foo", "{}"),
        ToolCall::function("call_3", "get_weather", r#"{"city": "Rome"}"#),
    ])]);
    let mut processor = processor(
        &backend,
        registry(vec![common::counting_weather(Arc::clone(&weather_calls))]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Paris, foo, then Rome").await.unwrap();

    assert!(reply.contains("foo"));
    assert_eq!(
        roles(&processor),
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    // only the first call's pair was recorded
    let messages = processor.memory().messages();
    assert_eq!(messages[2].function_call.as_ref().unwrap().id, "call_1");
    assert_eq!(messages[3].content.as_deref(), Some("18°C and clear in Paris"));

    assert_eq!(weather_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_malformed_arguments_become_error_text() {
    let backend = ScriptedBackend::new(vec![Completion::ToolCalls(vec![ToolCall::function(
        "call_1",
        "get_weather",
        "{city: Paris",
    )])]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Weather please").await.unwrap();

    assert!(reply.starts_with("Sorry, the get_weather tool failed"));
    assert!(!roles(&processor).contains(&Role::Tool));
}

#[tokio::test]
async fn test_missing_required_argument() {
    let backend = ScriptedBackend::new(vec![call("call_1", "get_weather", json!({}))]);
    let mut processor = processor(
        &backend,
        registry(vec![paris_weather()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Weather please").await.unwrap();

    assert!(reply.contains("city"));
    assert!(!roles(&processor).contains(&Role::Tool));
}

#[tokio::test]
async fn test_failing_tool_reports_error() {
    let backend = ScriptedBackend::new(vec![call("call_1", "explode", json!({}))]);
    let mut processor = processor(
        &backend,
        registry(vec![common::failing_tool()]),
        ProcessorSettings::default(),
    )
    .await;

    let reply = processor.process_input("Blow it up").await.unwrap();

    assert_eq!(reply, "Sorry, the explode tool failed: boom");
}

#[tokio::test]
async fn test_tool_timeout() {
    let backend = ScriptedBackend::new(vec![call("call_1", "slow", json!({}))]);
    let settings = ProcessorSettings {
        tool_timeout: Duration::from_millis(50),
        ..ProcessorSettings::default()
    };
    let mut processor = processor(&backend, registry(vec![common::slow_tool()]), settings).await;

    let reply = processor.process_input("Take your time").await.unwrap();

    assert!(reply.starts_with("Sorry, the slow tool failed"));
    assert!(reply.contains("timed out"));
    assert!(!roles(&processor).contains(&Role::Tool));
}

#[tokio::test]
async fn test_backend_error_propagates() {
    let backend = ScriptedBackend::new(Vec::new());
    let mut processor = processor(&backend, ToolRegistry::new(), ProcessorSettings::default()).await;

    assert!(processor.process_input("Anyone there?").await.is_err());
    // the user message was already recorded
    assert_eq!(roles(&processor), vec![Role::System, Role::User]);
}

#[tokio::test]
async fn test_clear_memory_starts_new_conversation() {
    let backend = ScriptedBackend::new(vec![text("Hello!")]);
    let mut processor = processor(&backend, ToolRegistry::new(), ProcessorSettings::default()).await;

    processor.process_input("Hi there").await.unwrap();
    let before = processor.memory().conversation_id().to_string();

    processor.clear_memory().await.unwrap();

    assert_ne!(processor.memory().conversation_id(), before);
    assert_eq!(processor.memory().len(), 1);
    assert_eq!(processor.memory().messages()[0].role, Role::System);
}

#[tokio::test]
async fn test_first_turn_titles_conversation() {
    let backend = ScriptedBackend::new(vec![text("Sure."), text("Done.")]);
    let mut processor = processor(&backend, ToolRegistry::new(), ProcessorSettings::default()).await;

    processor.process_input("Plan my trip to Rome").await.unwrap();
    processor.process_input("Add a day in Florence").await.unwrap();

    assert_eq!(processor.memory().title(), Some("Test conversation"));
    assert_eq!(backend.title_requests(), 1);
}

#[tokio::test]
async fn test_title_failure_uses_placeholder() {
    let backend = ScriptedBackend::with_title(vec![text("Sure.")], None);
    let mut processor = processor(&backend, ToolRegistry::new(), ProcessorSettings::default()).await;

    let reply = processor.process_input("Plan my trip to Rome").await.unwrap();

    assert_eq!(reply, "Sure.");
    assert_eq!(processor.memory().title(), Some(camille::memory::PLACEHOLDER_TITLE));
}
