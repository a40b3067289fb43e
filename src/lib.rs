//! Camille - voice-driven conversational assistant
//!
//! This library provides the core functionality for Camille:
//! - Tool-augmented conversation turns against an OpenAI-compatible backend
//! - Persistent conversation history and user facts in `SQLite`
//! - Voice processing (capture, wake phrases, STT, TTS)
//! - Avatar state for a render loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   Voice loop (own thread)    │   Render loop (main)  │
//! │   capture → STT → Assistant  │   avatar watch + flag │
//! └───────────────┬──────────────┴───────────▲──────────┘
//!                 │                          │
//! ┌───────────────▼──────────────┐   ┌──────┴──────────┐
//! │         LlmProcessor         │──▶│  Speech worker  │
//! │  Memory │ ToolRegistry │ LLM │   │   TTS → player  │
//! └───────────────┬──────────────┘   └─────────────────┘
//!                 │
//! ┌───────────────▼──────────────┐
//! │   SQLite (conversations,     │
//! │   messages, user memories)   │
//! └──────────────────────────────┘
//! ```

pub mod assistant;
pub mod avatar;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod memory;
pub mod processor;
pub mod setup;
pub mod tools;
pub mod user_memory;
pub mod voice;

pub use assistant::{Assistant, ListenMode};
pub use avatar::{AvatarLayer, AvatarLayers, AvatarState};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use llm::{Completion, CompletionBackend, OpenAiClient};
pub use memory::Memory;
pub use processor::{LlmProcessor, ProcessorSettings};
pub use tools::{Tool, ToolRegistry};
pub use user_memory::UserMemoryManager;
