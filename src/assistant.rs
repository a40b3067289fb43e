//! Voice assistant orchestration
//!
//! [`Assistant`] reacts to transcripts: wake phrases, commands, and answers
//! to the setup interview. [`run_voice_loop`] feeds it from the microphone
//! and must run on the thread that owns the audio stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::avatar::{AvatarLayer, AvatarState};
use crate::config::VoiceConfig;
use crate::processor::LlmProcessor;
use crate::user_memory::UserMemoryManager;
use crate::voice::{
    AudioCapture, SAMPLE_RATE, Segmenter, SpeechHandle, Transcriber, WakePhrases, samples_to_wav,
};
use crate::Result;

/// Transcripts shorter than this (after trimming) count as nothing heard
pub const MIN_TRANSCRIPT_CHARS: usize = 4;

pub const NOTHING_HEARD: &str = "I didn't hear anything.";
pub const NOT_CAUGHT: &str = "Sorry, I didn't catch that.";
pub const TURN_FAILED: &str = "Sorry, something went wrong while I was thinking.";
pub const MEMORY_CLEARED: &str = "Okay, I've started a new conversation.";
pub const SETUP_INTRO: &str = "Before we start, I'd like to get to know you.";
pub const SETUP_DONE: &str = "Thanks! I'll remember that.";

const RESET_PHRASES: &[&str] = &["clear memory", "clear your memory", "new conversation"];

/// Politeness allowed around a reset command
const RESET_LEADERS: &[&str] = &["please", "okay", "ok", "can you", "could you", "lets", "start a", "begin a"];
const RESET_TRAILERS: &[&str] = &["please", "now"];

/// Tick for draining captured audio
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Room noise sampled before listening starts
const CALIBRATION: Duration = Duration::from_secs(1);

/// What the next utterance is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Waiting for a wake phrase
    Wake,
    /// Recording a command after the wake phrase
    Command,
    /// Recording the answer to a setup question
    Setup(usize),
}

/// Reacts to user utterances and drives speech and the avatar
pub struct Assistant {
    processor: LlmProcessor,
    users: UserMemoryManager,
    speech: SpeechHandle,
    avatar: AvatarState,
    wake: WakePhrases,
    user_name: Option<String>,
    mode: ListenMode,
}

impl Assistant {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(
        processor: LlmProcessor,
        users: UserMemoryManager,
        speech: SpeechHandle,
        avatar: AvatarState,
        wake: WakePhrases,
        user_name: Option<String>,
    ) -> Self {
        Self {
            processor,
            users,
            speech,
            avatar,
            wake,
            user_name,
            mode: ListenMode::Wake,
        }
    }

    /// Start the setup interview if no setup facts exist yet
    ///
    /// # Errors
    ///
    /// Returns error if the fact store cannot be read
    pub fn begin(&mut self) -> Result<()> {
        if self.users.needs_setup()? {
            tracing::info!("no setup facts found, starting interview");
            self.speech.speak(SETUP_INTRO);
            self.ask_setup_question(0);
        }
        Ok(())
    }

    #[must_use]
    pub const fn mode(&self) -> ListenMode {
        self.mode
    }

    /// Whether the next recording should start without waiting for speech
    #[must_use]
    pub fn records_immediately(&self) -> bool {
        self.mode != ListenMode::Wake
    }

    #[must_use]
    pub const fn processor(&self) -> &LlmProcessor {
        &self.processor
    }

    /// Phrase spoken when the wake phrase is heard
    #[must_use]
    pub fn greeting(&self) -> String {
        self.user_name
            .as_deref()
            .map_or_else(|| "Yes?".to_string(), |name| format!("Yes {name}"))
    }

    /// React to a transcript in the current mode
    ///
    /// # Errors
    ///
    /// Returns error if the fact store or transcript cannot be written
    pub async fn on_transcript(&mut self, transcript: &str) -> Result<()> {
        match self.mode {
            ListenMode::Wake => {
                let Some(command) = self.wake.command_after(transcript) else {
                    tracing::trace!(transcript, "no wake phrase");
                    return Ok(());
                };

                if command.chars().count() >= MIN_TRANSCRIPT_CHARS {
                    // wake phrase and command in one breath
                    self.converse(&command).await;
                } else {
                    self.speech.speak(self.greeting());
                    self.mode = ListenMode::Command;
                }
            }
            ListenMode::Command => {
                self.mode = ListenMode::Wake;
                self.converse(transcript).await;
            }
            ListenMode::Setup(index) => self.answer_setup_question(index, transcript).await?,
        }
        Ok(())
    }

    /// React to a recording that could not be transcribed
    pub fn on_transcription_failed(&mut self) {
        if self.mode == ListenMode::Command {
            self.mode = ListenMode::Wake;
            self.avatar.set_state(AvatarLayer::Listening, false);
            self.speech.speak(NOT_CAUGHT);
        }
    }

    async fn converse(&mut self, text: &str) {
        let reply = match self.handle_utterance(text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                TURN_FAILED.to_string()
            }
        };
        self.speech.speak(reply);
    }

    /// Produce the reply to one utterance
    ///
    /// Short utterances and memory-reset commands are answered locally;
    /// anything else is a conversation turn.
    ///
    /// # Errors
    ///
    /// Returns error if the backend or storage fails
    pub async fn handle_utterance(&mut self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.chars().count() < MIN_TRANSCRIPT_CHARS {
            self.avatar.set_state(AvatarLayer::Listening, false);
            return Ok(NOTHING_HEARD.to_string());
        }

        if is_reset_command(text) {
            tracing::info!("starting a new conversation on request");
            self.processor.clear_memory().await?;
            self.avatar.set_state(AvatarLayer::Listening, false);
            return Ok(MEMORY_CLEARED.to_string());
        }

        self.avatar.set_state(AvatarLayer::Thinking, true);
        let reply = self.processor.process_input(text).await;
        self.avatar.set_state(AvatarLayer::Thinking, false);
        reply
    }

    fn ask_setup_question(&mut self, index: usize) {
        if let Some(question) = self.users.setup_questions().get(index) {
            self.speech.speak(question.question);
            self.mode = ListenMode::Setup(index);
        }
    }

    async fn answer_setup_question(&mut self, index: usize, answer: &str) -> Result<()> {
        let questions = self.users.setup_questions();
        let Some(question) = questions.get(index) else {
            self.mode = ListenMode::Wake;
            return Ok(());
        };

        if answer.trim().is_empty() {
            self.speech.speak(NOTHING_HEARD);
            self.ask_setup_question(index);
            return Ok(());
        }

        self.users.save_setup_question(question, answer)?;

        if index + 1 < questions.len() {
            self.ask_setup_question(index + 1);
        } else {
            self.finish_setup().await?;
        }
        Ok(())
    }

    /// Reload facts into the prompt and start fresh
    async fn finish_setup(&mut self) -> Result<()> {
        if let Some(name) = self.users.user_name()? {
            self.user_name = Some(name);
        }
        self.processor.set_user_name(self.user_name.clone());
        self.processor.set_facts(self.users.facts_for_prompt()?);
        self.processor.clear_memory().await?;

        self.mode = ListenMode::Wake;
        self.avatar.set_state(AvatarLayer::Listening, false);
        self.speech.speak(SETUP_DONE);
        tracing::info!("setup interview complete");
        Ok(())
    }
}

/// Whether an utterance is a request to forget the current conversation
///
/// The whole utterance must be the command, give or take a few polite
/// words; questions that merely mention a reset phrase do not count.
#[must_use]
pub fn is_reset_command(text: &str) -> bool {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut command = normalized.as_str();
    while let Some(rest) = RESET_LEADERS
        .iter()
        .find_map(|w| command.strip_prefix(w).and_then(|r| r.strip_prefix(' ')))
    {
        command = rest;
    }
    while let Some(rest) = RESET_TRAILERS
        .iter()
        .find_map(|w| command.strip_suffix(w).and_then(|r| r.strip_suffix(' ')))
    {
        command = rest;
    }

    RESET_PHRASES.contains(&command)
}

/// Listen on the microphone and feed transcripts to the assistant
///
/// Runs until `running` is cleared. The audio stream is not `Send`, so this
/// future must be driven on the thread that calls it.
///
/// # Errors
///
/// Returns error if the microphone cannot be opened
#[allow(clippy::future_not_send)]
pub async fn run_voice_loop(
    mut assistant: Assistant,
    transcriber: Arc<dyn Transcriber>,
    voice: &VoiceConfig,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    tracing::info!("calibrating noise floor");
    tokio::time::sleep(CALIBRATION).await;
    let mut segmenter = Segmenter::calibrated(&capture.take_buffer(), voice.max_silent_chunks);

    assistant.begin()?;
    let mut armed = false;

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    while running.load(Ordering::Acquire) {
        ticker.tick().await;

        // don't transcribe our own voice
        if assistant.speech.is_speaking() {
            capture.clear_buffer();
            segmenter.reset();
            armed = false;
            continue;
        }

        if assistant.records_immediately() && !armed {
            capture.clear_buffer();
            segmenter.start_recording();
            assistant.avatar.set_state(AvatarLayer::Listening, true);
            armed = true;
            continue;
        }

        let Some(utterance) = segmenter.push(&capture.take_buffer()) else {
            continue;
        };
        armed = false;

        let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;
        match transcriber.transcribe(wav).await {
            Ok(transcript) => {
                if let Err(e) = assistant.on_transcript(&transcript).await {
                    tracing::error!(error = %e, "failed to handle transcript");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                assistant.on_transcription_failed();
            }
        }
    }

    capture.stop();
    tracing::info!("voice loop stopped");
    Ok(())
}
