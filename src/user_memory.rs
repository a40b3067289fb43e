//! Durable user facts and the first-run setup interview

use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;
use crate::db::{DbPool, FactRepo, UserMemoryFact};

/// Source tag for facts collected by the setup interview
pub const SETUP_SOURCE: &str = "setup";

/// A question asked during setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupQuestion {
    pub key: &'static str,
    pub question: &'static str,
    /// Fact template with a single `{value}` placeholder
    pub memory_template: &'static str,
}

impl SetupQuestion {
    /// Render the fact for an answer
    #[must_use]
    pub fn render(&self, answer: &str) -> String {
        let answer = answer.trim().trim_end_matches(['.', '!', '?']);
        self.memory_template.replacen("{value}", answer, 1)
    }
}

const SETUP_QUESTIONS: &[SetupQuestion] = &[
    SetupQuestion {
        key: "name",
        question: "What is your name?",
        memory_template: "My name is {value}",
    },
    SetupQuestion {
        key: "city",
        question: "Which city do you live in?",
        memory_template: "I live in {value}",
    },
    SetupQuestion {
        key: "occupation",
        question: "What do you do for a living?",
        memory_template: "I work as {value}",
    },
];

/// Gatekeeper for the setup interview and store for user facts
pub struct UserMemoryManager {
    repo: FactRepo,
    setup_done: AtomicBool,
}

impl UserMemoryManager {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: FactRepo::new(pool),
            setup_done: AtomicBool::new(false),
        }
    }

    /// Whether no setup facts have been stored yet
    ///
    /// Once setup is observed as complete the answer is cached; a `true`
    /// answer is always re-checked against storage.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be read
    pub fn needs_setup(&self) -> Result<bool> {
        if self.setup_done.load(Ordering::Acquire) {
            return Ok(false);
        }

        let needs = self.repo.count_by_source(SETUP_SOURCE)? == 0;
        if !needs {
            self.setup_done.store(true, Ordering::Release);
        }
        Ok(needs)
    }

    /// Questions asked during setup, in order
    #[must_use]
    pub const fn setup_questions(&self) -> &'static [SetupQuestion] {
        SETUP_QUESTIONS
    }

    /// Store the answer to a setup question as a fact
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn save_setup_question(
        &self,
        question: &SetupQuestion,
        answer: &str,
    ) -> Result<UserMemoryFact> {
        tracing::info!(key = question.key, "saving setup answer");
        self.save_memory(question.key, &question.render(answer), SETUP_SOURCE)
    }

    /// Store a fact, replacing any previous value for the same key and source
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn save_memory(&self, key: &str, value: &str, source: &str) -> Result<UserMemoryFact> {
        self.repo.upsert(key, value, source)
    }

    /// Facts from one source
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be read
    pub fn memories(&self, source: &str) -> Result<Vec<UserMemoryFact>> {
        self.repo.list(Some(source))
    }

    /// All fact values, for inclusion in the system prompt
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be read
    pub fn facts_for_prompt(&self) -> Result<Vec<String>> {
        Ok(self.repo.list(None)?.into_iter().map(|f| f.value).collect())
    }

    /// Name the user gave during setup, if any
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be read
    pub fn user_name(&self) -> Result<Option<String>> {
        let name = self
            .memories(SETUP_SOURCE)?
            .into_iter()
            .find(|f| f.key == "name")
            .and_then(|f| {
                f.value
                    .strip_prefix("My name is ")
                    .map(|n| n.trim().to_string())
            })
            .filter(|n| !n.is_empty());
        Ok(name)
    }
}
