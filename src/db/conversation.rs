//! Conversation repository

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::{DbPool, connection};
use crate::{Error, Result};
use crate::llm::{FunctionCall, Message, Role};

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message as stored in a conversation
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: String,
    pub message: Message,
    pub created_at: DateTime<Utc>,
}

/// Conversation and message repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a fresh, untitled conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self) -> Result<Conversation> {
        let conn = connection(&self.pool)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (id, created_at) VALUES (?1, ?2)",
            params![&id, timestamp(now)],
        )?;

        tracing::debug!(conversation_id = %id, "conversation created");

        Ok(Conversation {
            id,
            title: None,
            created_at: now,
        })
    }

    /// Get a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = connection(&self.pool)?;

        let conversation = conn
            .query_row(
                "SELECT id, title, created_at FROM conversations WHERE id = ?1",
                [id],
                conversation_from_row,
            )
            .optional()?;

        Ok(conversation)
    }

    /// Most recently created conversation, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn latest(&self) -> Result<Option<Conversation>> {
        let conn = connection(&self.pool)?;

        let conversation = conn
            .query_row(
                "SELECT id, title, created_at FROM conversations
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                conversation_from_row,
            )
            .optional()?;

        Ok(conversation)
    }

    /// List conversations, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, limit: usize) -> Result<Vec<Conversation>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT id, title, created_at FROM conversations
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let conversations = stmt
            .query_map([limit as i64], conversation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conversations)
    }

    /// Set the title of a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_title(&self, id: &str, title: &str) -> Result<()> {
        let conn = connection(&self.pool)?;
        conn.execute(
            "UPDATE conversations SET title = ?1 WHERE id = ?2",
            [title, id],
        )?;
        Ok(())
    }

    /// Append a message to a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add_message(&self, conversation_id: &str, message: &Message) -> Result<StoredMessage> {
        let mut stored = self.add_messages(conversation_id, std::slice::from_ref(message))?;
        stored
            .pop()
            .ok_or_else(|| Error::Database("message insert returned no row".to_string()))
    }

    /// Append several messages atomically, in order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails; nothing is stored then
    pub fn add_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<Vec<StoredMessage>> {
        let mut conn = connection(&self.pool)?;
        let tx = conn.transaction()?;

        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            let now = Utc::now();
            let call = message.function_call.as_ref();

            tx.execute(
                "INSERT INTO messages
                    (conversation_id, role, content, call_id, call_name, call_arguments, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    conversation_id,
                    message.role.as_str(),
                    message.content,
                    call.map(|c| c.id.as_str()),
                    call.map(|c| c.name.as_str()),
                    call.map(|c| c.arguments.as_str()),
                    timestamp(now),
                ],
            )?;

            let id = tx.last_insert_rowid();
            tracing::debug!(conversation_id, message_id = id, role = %message.role, "message persisted");

            stored.push(StoredMessage {
                id,
                conversation_id: conversation_id.to_string(),
                message: message.clone(),
                created_at: now,
            });
        }

        tx.commit()?;
        Ok(stored)
    }

    /// All messages of a conversation in creation order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, call_id, call_name, call_arguments, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let messages = stmt
            .query_map([conversation_id], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(messages)
    }

    /// Count messages in a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn message_count(&self, conversation_id: &str) -> Result<usize> {
        let conn = connection(&self.pool)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role = Role::parse(&row.get::<_, String>(2)?).unwrap_or(Role::User);
    let call_id: Option<String> = row.get(4)?;
    let call_name: Option<String> = row.get(5)?;
    let call_arguments: Option<String> = row.get(6)?;

    let function_call = match (call_id, call_name) {
        (Some(id), Some(name)) => Some(FunctionCall {
            id,
            name,
            arguments: call_arguments.unwrap_or_else(|| "{}".to_string()),
        }),
        _ => None,
    };

    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        message: Message {
            role,
            content: row.get(3)?,
            function_call,
        },
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Fixed-width RFC 3339 so lexical order matches chronological order
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
