//! Background speech worker
//!
//! Phrases are queued without waiting; the worker speaks them one at a time
//! and counts pending phrases so the render loop can poll whether it is
//! speaking.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Speaker;

enum SpeechCommand {
    Say(String),
    Shutdown,
}

/// Handle to a running speech worker
#[derive(Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechCommand>,
    /// Phrases queued or being spoken
    pending: Arc<AtomicUsize>,
}

impl SpeechHandle {
    /// Queue a phrase; never blocks
    pub fn speak(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(SpeechCommand::Say(text)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("speech worker is gone, dropping phrase");
        }
    }

    /// Whether a phrase is queued or being spoken
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Wait until all queued phrases have been spoken
    pub async fn wait_idle(&self) {
        while self.is_speaking() {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Ask the worker to stop after the phrases already queued
    pub fn shutdown(&self) {
        let _ = self.tx.send(SpeechCommand::Shutdown);
    }
}

/// Owns the speech task
pub struct SpeechWorker {
    handle: SpeechHandle,
    task: JoinHandle<()>,
}

impl SpeechWorker {
    /// Spawn the worker on the current runtime
    #[must_use]
    pub fn spawn(speaker: Arc<dyn Speaker>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(run(speaker, rx, Arc::clone(&pending)));

        Self {
            handle: SpeechHandle { tx, pending },
            task,
        }
    }

    #[must_use]
    pub fn handle(&self) -> SpeechHandle {
        self.handle.clone()
    }

    /// Stop the worker and wait for it to finish
    pub async fn stop(self) {
        self.handle.shutdown();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "speech worker panicked");
        }
    }
}

async fn run(
    speaker: Arc<dyn Speaker>,
    mut rx: mpsc::UnboundedReceiver<SpeechCommand>,
    pending: Arc<AtomicUsize>,
) {
    tracing::debug!("speech worker started");

    while let Some(command) = rx.recv().await {
        match command {
            SpeechCommand::Say(text) => {
                tracing::debug!(text = %text, "speaking");
                if let Err(e) = speaker.say(&text).await {
                    tracing::error!(error = %e, "speech failed");
                }
                pending.fetch_sub(1, Ordering::AcqRel);
            }
            SpeechCommand::Shutdown => break,
        }
    }

    // phrases queued behind the shutdown are dropped unspoken
    pending.store(0, Ordering::Release);
    tracing::debug!("speech worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::Result;

    #[derive(Default)]
    struct RecordingSpeaker {
        said: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Speaker for RecordingSpeaker {
        async fn say(&self, text: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.said.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_phrases_spoken_in_order() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let worker = SpeechWorker::spawn(speaker.clone());
        let handle = worker.handle();

        handle.speak("Yes?");
        handle.speak("It is sunny.");
        assert!(handle.is_speaking());

        handle.wait_idle().await;
        assert!(!handle.is_speaking());
        assert_eq!(*speaker.said.lock().unwrap(), vec!["Yes?", "It is sunny."]);

        worker.stop().await;
    }

    #[tokio::test]
    async fn test_speaking_until_last_queued_phrase_finishes() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let worker = SpeechWorker::spawn(speaker.clone());
        let handle = worker.handle();

        handle.speak("One.");
        // let the worker pick up the first phrase, then queue another
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.speak("Two.");

        while speaker.said.lock().unwrap().is_empty() {
            assert!(handle.is_speaking());
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // first phrase done, second still pending
        assert!(handle.is_speaking());

        handle.wait_idle().await;
        assert_eq!(speaker.said.lock().unwrap().len(), 2);

        worker.stop().await;
    }

    #[tokio::test]
    async fn test_blank_phrase_ignored() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let worker = SpeechWorker::spawn(speaker.clone());

        worker.handle().speak("   ");
        assert!(!worker.handle().is_speaking());

        worker.stop().await;
        assert!(speaker.said.lock().unwrap().is_empty());
    }
}
