//! Configuration management for Camille
//!
//! Values resolve as environment > config file > built-in defaults.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

pub use file::CamilleConfigFile;

/// Default OpenAI-compatible endpoint (a local LM Studio server)
pub const DEFAULT_API_BASE: &str = "http://localhost:1234/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama-3.2-3b-instruct";

/// Default endpoint for speech models
pub const DEFAULT_SPEECH_API_BASE: &str = "https://api.openai.com/v1";

/// Camille configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the assistant answers to
    pub ai_name: String,

    /// Name used to address the user, if known
    pub user_name: Option<String>,

    /// Completion backend configuration
    pub llm: LlmConfig,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Tool configuration
    pub tools: ToolsConfig,

    /// Path to data directory (database, recordings)
    pub data_dir: PathBuf,

    /// Path to the `SQLite` database
    pub db_path: PathBuf,
}

/// Completion backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// Lowercase phrases that wake the assistant
    pub wake_phrases: Vec<String>,

    /// Base URL for transcription and speech endpoints
    pub api_base: String,

    pub api_key: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// Consecutive silent chunks that end a recording
    pub max_silent_chunks: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_phrases: default_wake_phrases("Camille"),
            api_base: DEFAULT_SPEECH_API_BASE.to_string(),
            api_key: None,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 1.0,
            max_silent_chunks: 15,
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Brave Search API subscription token
    pub brave_api_token: Option<String>,

    /// Per-invocation timeout
    pub timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            brave_api_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration, optionally forcing voice off
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let mut config = Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())?;

        if disable_voice {
            config.voice.enabled = false;
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!(path = %config.data_dir.display(), error = %e, "failed to create data dir");
        }

        Ok(config)
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric value fails to parse or is out of range
    pub fn resolve<F>(fc: CamilleConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ai_name = env("CAMILLE_AI_NAME")
            .or(fc.ai_name)
            .unwrap_or_else(|| "Camille".to_string());
        let user_name = env("CAMILLE_USER_NAME").or(fc.user_name);

        let api_base = env("OPENAI_API_BASE")
            .or(fc.llm.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_key = env("OPENAI_API_KEY").or(fc.llm.api_key);

        let temperature = parsed(&env, "CAMILLE_TEMPERATURE")?
            .or(fc.llm.temperature)
            .unwrap_or(0.7);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {temperature}"
            )));
        }

        let llm = LlmConfig {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            model: env("CAMILLE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            timeout: Duration::from_secs(
                parsed(&env, "CAMILLE_LLM_TIMEOUT")?
                    .or(fc.llm.timeout_secs)
                    .unwrap_or(120),
            ),
        };

        let wake_phrases = fc
            .voice
            .wake_phrases
            .filter(|phrases| !phrases.is_empty())
            .unwrap_or_else(|| default_wake_phrases(&ai_name))
            .into_iter()
            .map(|p| p.to_lowercase())
            .collect();

        let voice = VoiceConfig {
            enabled: parsed(&env, "CAMILLE_VOICE_ENABLED")?
                .or(fc.voice.enabled)
                .unwrap_or(true),
            wake_phrases,
            api_base: env("CAMILLE_SPEECH_API_BASE")
                .or(fc.voice.api_base)
                .unwrap_or_else(|| DEFAULT_SPEECH_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            stt_model: env("CAMILLE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("CAMILLE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("CAMILLE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "nova".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            max_silent_chunks: fc.voice.max_silent_chunks.unwrap_or(15),
        };

        let tools = ToolsConfig {
            brave_api_token: env("BRAVE_SEARCH_API_TOKEN").or(fc.tools.brave_api_token),
            timeout: Duration::from_secs(
                parsed(&env, "CAMILLE_TOOL_TIMEOUT")?
                    .or(fc.tools.timeout_secs)
                    .unwrap_or(30),
            ),
        };

        // ~/.local/share/camille on Linux
        let data_dir = env("CAMILLE_DATA_DIR")
            .or(fc.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let db_path = data_dir.join("camille.db");

        Ok(Self {
            ai_name,
            user_name,
            llm,
            voice,
            tools,
            data_dir,
            db_path,
        })
    }
}

fn default_wake_phrases(ai_name: &str) -> Vec<String> {
    let name = ai_name.to_lowercase();
    vec![format!("hey {name}"), format!("ok {name}"), name]
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("camille"))
}

fn parsed<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}
