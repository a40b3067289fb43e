//! TOML configuration file loading
//!
//! Supports `~/.config/camille/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CamilleConfigFile {
    /// Name the assistant answers to
    pub ai_name: Option<String>,

    /// Name used to address the user
    pub user_name: Option<String>,

    /// Completion backend configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Tool configuration
    #[serde(default)]
    pub tools: ToolsFileConfig,

    /// Override for the data directory
    pub data_dir: Option<String>,
}

/// Completion backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `http://localhost:1234/v1`)
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// Phrases that wake the assistant
    pub wake_phrases: Option<Vec<String>>,

    /// Base URL for the speech endpoints (defaults to the LLM base)
    pub api_base: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Silent chunks that end a recording
    pub max_silent_chunks: Option<usize>,
}

/// Tool configuration
#[derive(Debug, Default, Deserialize)]
pub struct ToolsFileConfig {
    /// Brave Search API subscription token
    pub brave_api_token: Option<String>,

    /// Per-invocation timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CamilleConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CamilleConfigFile {
    config_file_path().map_or_else(CamilleConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> CamilleConfigFile {
    if !path.exists() {
        return CamilleConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CamilleConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CamilleConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/camille/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("camille").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let fc: CamilleConfigFile = toml::from_str(
            r#"
            user_name = "Ada"

            [llm]
            model = "qwen2.5-7b-instruct"

            [tools]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(fc.user_name.as_deref(), Some("Ada"));
        assert_eq!(fc.llm.model.as_deref(), Some("qwen2.5-7b-instruct"));
        assert!(fc.llm.api_base.is_none());
        assert_eq!(fc.tools.timeout_secs, Some(10));
        assert!(fc.voice.enabled.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_from(&dir.path().join("absent.toml"));
        assert!(fc.ai_name.is_none());
    }

    #[test]
    fn test_invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "llm = [not toml").unwrap();

        let fc = load_from(&path);
        assert!(fc.llm.model.is_none());
    }
}
