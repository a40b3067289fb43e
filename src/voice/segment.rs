//! Energy-based utterance segmentation
//!
//! Audio is cut into fixed chunks. A chunk whose RMS is below the silence
//! threshold counts as silent; an utterance ends once more than
//! `max_silent_chunks` silent chunks arrive in a row.

use super::capture::rms;

/// Samples per analysis chunk
pub const CHUNK_SAMPLES: usize = 1024;

/// Threshold multiplier over the calibrated noise floor
pub const NOISE_MULTIPLIER: f32 = 1.5;

/// Lowest threshold a calibration may produce
pub const MIN_THRESHOLD: f32 = 0.005;

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for a chunk above the threshold
    Idle,
    /// Accumulating an utterance
    Recording,
}

/// Splits a sample stream into utterances separated by silence
#[derive(Debug)]
pub struct Segmenter {
    threshold: f32,
    max_silent_chunks: usize,
    state: SegmentState,
    pending: Vec<f32>,
    buffer: Vec<f32>,
    silent_chunks: usize,
    speech_chunks: usize,
}

impl Segmenter {
    #[must_use]
    pub const fn new(threshold: f32, max_silent_chunks: usize) -> Self {
        Self {
            threshold,
            max_silent_chunks,
            state: SegmentState::Idle,
            pending: Vec::new(),
            buffer: Vec::new(),
            silent_chunks: 0,
            speech_chunks: 0,
        }
    }

    /// Create a segmenter whose threshold sits just above measured room noise
    #[must_use]
    pub fn calibrated(noise: &[f32], max_silent_chunks: usize) -> Self {
        let threshold = calibrate_threshold(noise);
        tracing::info!(threshold, "silence threshold calibrated");
        Self::new(threshold, max_silent_chunks)
    }

    /// Begin recording immediately, without waiting for speech
    pub fn start_recording(&mut self) {
        self.reset();
        self.state = SegmentState::Recording;
    }

    /// Feed captured samples; returns a finished utterance, if any
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        self.pending.extend_from_slice(samples);

        let mut offset = 0;
        let mut finished = None;
        while finished.is_none() && self.pending.len() - offset >= CHUNK_SAMPLES {
            let end = offset + CHUNK_SAMPLES;
            let chunk = self.pending[offset..end].to_vec();
            offset = end;
            finished = self.push_chunk(&chunk);
        }
        self.pending.drain(..offset);

        finished
    }

    fn push_chunk(&mut self, chunk: &[f32]) -> Option<Vec<f32>> {
        let level = rms(chunk);
        let silent = level < self.threshold;

        match self.state {
            SegmentState::Idle => {
                if !silent {
                    tracing::trace!(level, "speech detected, recording");
                    self.state = SegmentState::Recording;
                    self.buffer.extend_from_slice(chunk);
                    self.speech_chunks = 1;
                }
                None
            }
            SegmentState::Recording => {
                if silent {
                    self.silent_chunks += 1;
                    if self.silent_chunks > self.max_silent_chunks {
                        tracing::debug!(
                            samples = self.buffer.len(),
                            speech_chunks = self.speech_chunks,
                            "utterance complete"
                        );
                        return Some(self.finish());
                    }
                } else {
                    self.silent_chunks = 0;
                    self.speech_chunks += 1;
                }
                self.buffer.extend_from_slice(chunk);
                None
            }
        }
    }

    fn finish(&mut self) -> Vec<f32> {
        self.state = SegmentState::Idle;
        self.silent_chunks = 0;
        self.speech_chunks = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Drop any partial utterance and return to idle
    pub fn reset(&mut self) {
        self.pending.clear();
        self.finish();
    }

    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Silence threshold for a block of room noise
#[must_use]
pub fn calibrate_threshold(noise: &[f32]) -> f32 {
    (rms(noise) * NOISE_MULTIPLIER).max(MIN_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(level: f32, count: usize) -> Vec<f32> {
        vec![level; CHUNK_SAMPLES * count]
    }

    #[test]
    fn test_calibration_floor() {
        assert!((calibrate_threshold(&[0.0; 512]) - MIN_THRESHOLD).abs() < f32::EPSILON);
        assert!((calibrate_threshold(&[0.1; 512]) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_silence_never_starts_an_utterance() {
        let mut segmenter = Segmenter::new(0.05, 2);
        assert!(segmenter.push(&chunks(0.0, 10)).is_none());
        assert_eq!(segmenter.state(), SegmentState::Idle);
    }

    #[test]
    fn test_utterance_ends_after_silent_run() {
        let mut segmenter = Segmenter::new(0.05, 2);

        assert!(segmenter.push(&chunks(0.3, 3)).is_none());
        assert_eq!(segmenter.state(), SegmentState::Recording);

        // two silent chunks are tolerated, the third ends it
        assert!(segmenter.push(&chunks(0.0, 2)).is_none());
        let utterance = segmenter.push(&chunks(0.0, 1)).unwrap();

        assert_eq!(utterance.len(), CHUNK_SAMPLES * 5);
        assert_eq!(segmenter.state(), SegmentState::Idle);
    }

    #[test]
    fn test_partial_chunks_are_buffered() {
        let mut segmenter = Segmenter::new(0.05, 0);
        assert!(segmenter.push(&vec![0.3; CHUNK_SAMPLES / 2]).is_none());
        assert_eq!(segmenter.state(), SegmentState::Idle);

        assert!(segmenter.push(&vec![0.3; CHUNK_SAMPLES / 2]).is_none());
        assert_eq!(segmenter.state(), SegmentState::Recording);
    }

    #[test]
    fn test_start_recording_captures_silence() {
        let mut segmenter = Segmenter::new(0.05, 1);
        segmenter.start_recording();

        let utterance = segmenter.push(&chunks(0.0, 2)).unwrap();
        assert_eq!(utterance.len(), CHUNK_SAMPLES);
    }
}
