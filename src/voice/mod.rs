//! Voice processing module
//!
//! Handles audio capture, utterance segmentation, wake phrase matching,
//! transcription, speech synthesis and playback.

mod capture;
mod playback;
mod segment;
mod stt;
mod tts;
mod wake;
mod worker;

use async_trait::async_trait;

pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
pub use playback::{PLAYBACK_SAMPLE_RATE, decode_mp3, play_mp3, play_samples};
pub use segment::{CHUNK_SAMPLES, SegmentState, Segmenter, calibrate_threshold};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use wake::{WakePhrases, extract_command};
pub use worker::{SpeechHandle, SpeechWorker};

use crate::Result;

/// Turns recorded WAV audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

/// Speaks text aloud, returning once playback is done
#[async_trait]
pub trait Speaker: Send + Sync {
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn say(&self, text: &str) -> Result<()>;
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        Self::transcribe(self, wav).await
    }
}
