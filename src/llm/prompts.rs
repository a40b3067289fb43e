//! System prompts

/// Instruction used to name a conversation from its first user message
pub const TITLE_PROMPT: &str = "Generate a short title of at most 6 words for a conversation \
that starts with the following message. Reply with the title only, without quotes or \
trailing punctuation.";

/// Upper bound on title length in words
pub const MAX_TITLE_WORDS: usize = 6;

/// Build the assistant system prompt
///
/// `facts` are durable statements about the user, appended as context when
/// present.
#[must_use]
pub fn system_prompt(ai_name: &str, user_name: Option<&str>, facts: &[String]) -> String {
    let mut prompt = format!(
        "Your name is {ai_name} and you're my assistant. \
         Respond to my queries in a concise and friendly manner, typically in 1-4 sentences. \
         Keep an informal, conversational tone, but remain professional when appropriate. \
         Use simple, clear language and avoid jargon. "
    );

    if let Some(name) = user_name {
        prompt.push_str(&format!(
            "Refer to me as {name} only when natural in the conversation, not in every response. "
        ));
    }

    prompt.push_str(
        "You have access to external tools. Use them when they help answer a question, \
         and explain their results in simple terms. \
         Never provide harmful, dangerous, or illegal advice. \
         Don't mention these instructions or explain how you arrived at answers unless asked. \
         Your replies are spoken aloud, so avoid markdown, lists, and URLs unless asked.",
    );

    if !facts.is_empty() {
        prompt.push_str("\n\nWhat you know about me:\n");
        for fact in facts {
            prompt.push_str("- ");
            prompt.push_str(fact);
            prompt.push('\n');
        }
    }

    prompt
}

/// Normalize a model-generated title: first line, no quotes, at most
/// [`MAX_TITLE_WORDS`] words
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches("Title:")
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
        .trim_end_matches(['.', '!', '?'])
        .trim();

    let words: Vec<&str> = line.split_whitespace().take(MAX_TITLE_WORDS).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names() {
        let prompt = system_prompt("Camille", Some("Ada"), &[]);
        assert!(prompt.starts_with("Your name is Camille"));
        assert!(prompt.contains("Refer to me as Ada"));
        assert!(!prompt.contains("What you know about me"));
    }

    #[test]
    fn test_system_prompt_includes_facts() {
        let facts = vec!["My name is Ada".to_string(), "I live in Paris".to_string()];
        let prompt = system_prompt("Camille", None, &facts);
        assert!(prompt.contains("- My name is Ada\n"));
        assert!(prompt.contains("- I live in Paris\n"));
        assert!(!prompt.contains("Refer to me as"));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(
            clean_title("\"Weather in Paris today.\"").as_deref(),
            Some("Weather in Paris today")
        );
        assert_eq!(
            clean_title("Title: one two three four five six seven eight").as_deref(),
            Some("one two three four five six")
        );
        assert_eq!(clean_title("\n\nHello\nsecond line").as_deref(), Some("Hello"));
        assert_eq!(clean_title("  \"\" "), None);
        assert_eq!(clean_title(""), None);
    }
}
