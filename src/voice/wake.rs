//! Wake phrase matching on transcripts

/// Phrases that wake the assistant, matched case-insensitively on word boundaries
#[derive(Debug, Clone)]
pub struct WakePhrases {
    phrases: Vec<String>,
}

impl WakePhrases {
    /// Normalize phrases; longer phrases are tried first
    #[must_use]
    pub fn new(phrases: Vec<String>) -> Self {
        let mut phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        phrases.dedup();

        tracing::debug!(phrases = ?phrases, "wake phrases loaded");
        Self { phrases }
    }

    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// First configured phrase present in the transcript
    #[must_use]
    pub fn detect(&self, transcript: &str) -> Option<&str> {
        let found = self
            .phrases
            .iter()
            .find(|p| find_phrase(transcript, p).is_some())
            .map(String::as_str);

        if let Some(phrase) = found {
            tracing::info!(phrase, transcript, "wake phrase detected");
        }
        found
    }

    /// Text spoken after the wake phrase, if the phrase is present
    #[must_use]
    pub fn command_after(&self, transcript: &str) -> Option<String> {
        let phrase = self.detect(transcript)?;
        Some(extract_command(transcript, phrase))
    }
}

/// Byte range of a phrase in the transcript, on word boundaries
fn find_phrase(transcript: &str, phrase: &str) -> Option<(usize, usize)> {
    let phrase_chars = phrase.chars().count();

    for (start, _) in transcript.char_indices() {
        let rest = &transcript[start..];
        let end = rest
            .char_indices()
            .nth(phrase_chars)
            .map_or(transcript.len(), |(i, _)| start + i);

        if transcript[start..end].to_lowercase() != phrase {
            continue;
        }

        let before_ok = transcript[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = transcript[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());

        if before_ok && after_ok {
            return Some((start, end));
        }
    }

    None
}

/// Strip the wake phrase and leading separators from a transcript
///
/// Returns the whole transcript trimmed when the phrase is absent.
#[must_use]
pub fn extract_command(transcript: &str, phrase: &str) -> String {
    let phrase = phrase.to_lowercase();
    find_phrase(transcript, &phrase).map_or_else(
        || transcript.trim().to_string(),
        |(_, end)| {
            transcript[end..]
                .trim_start_matches(|c: char| {
                    c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?')
                })
                .trim_end()
                .to_string()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases() -> WakePhrases {
        WakePhrases::new(vec![
            "camille".to_string(),
            "Hey Camille".to_string(),
            "ok camille".to_string(),
        ])
    }

    #[test]
    fn test_longest_phrase_first() {
        assert_eq!(phrases().phrases()[2], "camille");
        assert_eq!(phrases().detect("Hey Camille, lights on"), Some("hey camille"));
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(phrases().detect("camilleon is not a word"), None);
        assert_eq!(phrases().detect("thanks, Camille."), Some("camille"));
        assert_eq!(phrases().detect("hello world"), None);
    }

    #[test]
    fn test_extract_command() {
        assert_eq!(
            extract_command("Hey Camille, what's the weather?", "hey camille"),
            "what's the weather?"
        );
        assert_eq!(extract_command("Hey Camille.", "hey camille"), "");
        assert_eq!(extract_command("  no phrase here ", "hey camille"), "no phrase here");
    }

    #[test]
    fn test_command_after() {
        assert_eq!(
            phrases().command_after("OK Camille! Tell me a joke").as_deref(),
            Some("Tell me a joke")
        );
        assert!(phrases().command_after("tell me a joke").is_none());
    }
}
