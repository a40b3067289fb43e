//! Speech-to-text (STT) processing

use std::time::Duration;

use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Response from a Whisper-style transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes WAV audio through an `OpenAI`-compatible `/audio/transcriptions` endpoint
#[derive(Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl SpeechToText {
    /// Create an STT client from voice settings
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY required for Whisper".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.stt_model.clone(),
        })
    }

    /// Transcribe WAV bytes to text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API answers with an error
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "transcription request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to parse transcription"))?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = VoiceConfig::default();
        assert!(matches!(SpeechToText::new(&config), Err(Error::Config(_))));

        let config = VoiceConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:9000/v1/".to_string(),
            ..VoiceConfig::default()
        };
        let stt = SpeechToText::new(&config).unwrap();
        assert_eq!(stt.api_base, "http://localhost:9000/v1");
        assert_eq!(stt.model, "whisper-1");
    }
}
