//! Transcript, user fact and tool schema properties

use std::sync::Arc;

use serde_json::json;

use camille::db;
use camille::llm::{CompletionBackend, Role};
use camille::memory::ToolPayload;
use camille::tools::{ParamType, Tool, ToolParam};
use camille::{Memory, UserMemoryManager};

mod common;

use common::{ScriptedBackend, setup_test_db};

fn backend() -> Arc<dyn CompletionBackend> {
    ScriptedBackend::new(Vec::new())
}

fn payload(id: &str, result: &str) -> String {
    ToolPayload {
        tool_call_id: id.to_string(),
        name: "get_weather".to_string(),
        arguments: json!({"city": "Paris"}),
        result: result.to_string(),
    }
    .to_json()
    .unwrap()
}

#[tokio::test]
async fn test_messages_render_in_insertion_order() {
    let mut memory = Memory::new(setup_test_db(), backend()).unwrap();

    memory.add_message(Role::System, "prompt").await.unwrap();
    memory.add_message(Role::User, "first").await.unwrap();
    memory.add_message(Role::Tool, &payload("call_a", "sunny")).await.unwrap();
    memory.add_message(Role::Assistant, "second").await.unwrap();
    memory.add_message(Role::User, "third").await.unwrap();
    memory.add_message(Role::Tool, &payload("call_b", "rainy")).await.unwrap();

    let rendered = memory.get_messages();
    let roles: Vec<Role> = rendered.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Tool,
        ]
    );

    // each tool append is an invocation and a result sharing one id
    for (invocation, result, id) in [(2, 3, "call_a"), (6, 7, "call_b")] {
        let call = rendered[invocation].function_call.as_ref().unwrap();
        assert_eq!(call.id, id);
        assert_eq!(rendered[result].tool_call_id.as_deref(), Some(id));
    }
    assert_eq!(rendered[3].content, "sunny");
    assert_eq!(rendered[5].content, "third");
}

#[tokio::test]
async fn test_transcript_survives_reopen() {
    let pool = setup_test_db();
    let mut memory = Memory::new(pool.clone(), backend()).unwrap();

    memory.add_message(Role::System, "prompt").await.unwrap();
    memory.add_message(Role::User, "Remember the milk").await.unwrap();
    memory.add_message(Role::Tool, &payload("call_1", "noted")).await.unwrap();
    memory.add_message(Role::Assistant, "Will do").await.unwrap();

    let reopened = Memory::open(pool, backend()).unwrap();

    assert_eq!(reopened.conversation_id(), memory.conversation_id());
    assert_eq!(reopened.messages(), memory.messages());
    assert_eq!(reopened.title(), memory.title());
}

#[test]
fn test_needs_setup_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camille.db");

    {
        let users = UserMemoryManager::new(db::init(&path).unwrap());
        assert!(users.needs_setup().unwrap());

        let question = users.setup_questions()[1];
        users.save_setup_question(&question, "Lyon").unwrap();
        assert!(!users.needs_setup().unwrap());
    }

    let users = UserMemoryManager::new(db::init(&path).unwrap());
    assert!(!users.needs_setup().unwrap());
    assert_eq!(users.facts_for_prompt().unwrap(), vec!["I live in Lyon"]);
}

#[test]
fn test_schema_marks_params_without_default_required() {
    let tool = Tool::from_fn(
        "lookup",
        "Look something up",
        vec![
            ToolParam::optional("city", ParamType::from_type_name("str"), "default"),
            ToolParam::required("count", ParamType::from_type_name("int")),
        ],
        |_| Ok(String::new()),
    );

    let schema = tool.to_schema();
    let params = &schema.parameters;

    assert_eq!(params["type"], "object");
    assert_eq!(params["required"], json!(["count"]));
    assert_eq!(params["properties"]["city"]["type"], "string");
    assert_eq!(params["properties"]["city"]["default"], "default");
    assert_eq!(params["properties"]["count"]["type"], "number");
}
