//! Repository for durable user facts

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::conversation::parse_datetime;
use super::{DbPool, connection};
use crate::Result;

/// A durable fact about the user, independent of any conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMemoryFact {
    pub id: String,
    pub key: String,
    pub value: String,
    /// Where the fact came from, e.g. `setup`
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User fact repository
#[derive(Clone)]
pub struct FactRepo {
    pool: DbPool,
}

impl FactRepo {
    /// Create a new fact repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a fact, replacing the value of an existing fact with the same
    /// key and source
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(&self, key: &str, value: &str, source: &str) -> Result<UserMemoryFact> {
        let conn = connection(&self.pool)?;
        let now = Utc::now();
        let now_str = now.to_rfc3339_opts(SecondsFormat::Micros, true);

        let existing: Option<(String, String)> = conn
            .query_row(
                "SELECT id, created_at FROM user_memories WHERE key = ?1 AND source = ?2",
                [key, source],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, created_at) = if let Some((id, created_at)) = existing {
            conn.execute(
                "UPDATE user_memories SET value = ?1, updated_at = ?2 WHERE id = ?3",
                params![value, &now_str, &id],
            )?;
            (id, parse_datetime(&created_at))
        } else {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO user_memories (id, key, value, source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![&id, key, value, source, &now_str],
            )?;
            (id, now)
        };

        tracing::debug!(key, source, "user fact stored");

        Ok(UserMemoryFact {
            id,
            key: key.to_string(),
            value: value.to_string(),
            source: source.to_string(),
            created_at,
            updated_at: now,
        })
    }

    /// Facts, oldest first, optionally filtered by source
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, source: Option<&str>) -> Result<Vec<UserMemoryFact>> {
        let conn = connection(&self.pool)?;

        let facts = if let Some(source) = source {
            let mut stmt = conn.prepare(
                "SELECT id, key, value, source, created_at, updated_at
                 FROM user_memories WHERE source = ?1 ORDER BY created_at ASC",
            )?;
            stmt.query_map([source], fact_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, key, value, source, created_at, updated_at
                 FROM user_memories ORDER BY created_at ASC",
            )?;
            stmt.query_map([], fact_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        Ok(facts)
    }

    /// Count facts with the given source
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_by_source(&self, source: &str) -> Result<usize> {
        let conn = connection(&self.pool)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_memories WHERE source = ?1",
            [source],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<UserMemoryFact> {
    Ok(UserMemoryFact {
        id: row.get(0)?,
        key: row.get(1)?,
        value: row.get(2)?,
        source: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn test_upsert_and_list() {
        let repo = FactRepo::new(init_memory().unwrap());

        repo.upsert("name", "My name is Ada", "setup").unwrap();
        repo.upsert("likes", "Likes tea", "learned").unwrap();

        assert_eq!(repo.list(None).unwrap().len(), 2);
        let setup = repo.list(Some("setup")).unwrap();
        assert_eq!(setup.len(), 1);
        assert_eq!(setup[0].value, "My name is Ada");
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let repo = FactRepo::new(init_memory().unwrap());

        let first = repo.upsert("city", "I live in Lyon", "setup").unwrap();
        let second = repo.upsert("city", "I live in Paris", "setup").unwrap();

        assert_eq!(first.id, second.id);
        let facts = repo.list(Some("setup")).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "I live in Paris");
    }

    #[test]
    fn test_count_by_source() {
        let repo = FactRepo::new(init_memory().unwrap());
        assert_eq!(repo.count_by_source("setup").unwrap(), 0);

        repo.upsert("name", "My name is Ada", "setup").unwrap();
        assert_eq!(repo.count_by_source("setup").unwrap(), 1);
        assert_eq!(repo.count_by_source("learned").unwrap(), 0);
    }
}
