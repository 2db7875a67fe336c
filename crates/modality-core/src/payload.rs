//! Capability-agnostic payload values.
//!
//! A [`Payload`] is the single value type flowing in and out of every
//! backend's batch operation. Keeping the payload engine-agnostic is what
//! lets the registry and the operation table stay generic over capabilities:
//! an STT backend consumes `Audio` and produces `Text`, a TTS backend the
//! reverse, a VAD backend consumes `Audio` and produces `Flag`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ModalityError, ModalityResult};

/// A frame of mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// PCM samples, f32, mono, normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Create a frame from samples and their rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Input or output value of a batch operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// PCM audio (STT/VAD input, TTS output).
    Audio(AudioFrame),
    /// Text (STT/LLM output, TTS/LLM input).
    Text(String),
    /// Binary detector verdict (VAD output).
    Flag(bool),
}

impl Payload {
    /// Create an audio payload.
    pub fn audio(samples: Vec<f32>, sample_rate: u32) -> Self {
        Payload::Audio(AudioFrame::new(samples, sample_rate))
    }

    /// Create a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    /// Variant name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Audio(_) => "audio",
            Payload::Text(_) => "text",
            Payload::Flag(_) => "flag",
        }
    }

    /// Extract audio, or fail with `InvalidInput`.
    pub fn into_audio(self) -> ModalityResult<AudioFrame> {
        match self {
            Payload::Audio(frame) => Ok(frame),
            other => Err(ModalityError::invalid_input(format!(
                "expected audio payload, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Extract text, or fail with `InvalidInput`.
    pub fn into_text(self) -> ModalityResult<String> {
        match self {
            Payload::Text(text) => Ok(text),
            other => Err(ModalityError::invalid_input(format!(
                "expected text payload, got {}",
                other.kind_name()
            ))),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running
/// batch operation.
///
/// Engines poll the token at their own granularity (typically once per
/// decoding step); setting it never preempts the running call. Cloning the
/// token shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the operation holding this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can be reused for the next operation.
    pub fn clear(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

/// Options applied to a single batch operation.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Language hint (BCP-47 tag or engine-specific code), if the engine
    /// supports one.
    pub language: Option<String>,
    /// Voice identifier for synthesis engines.
    pub voice: Option<String>,
    /// Cooperative cancellation flag polled by the engine.
    pub cancel: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accessors() {
        let audio = Payload::audio(vec![0.0; 160], 16000);
        assert_eq!(audio.kind_name(), "audio");
        assert_eq!(audio.into_audio().unwrap().len(), 160);

        let text = Payload::text("hello");
        assert_eq!(text.clone().into_text().unwrap(), "hello");
        assert!(text.into_audio().is_err());
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 8000], 16000);
        assert!((frame.duration_secs() - 0.5).abs() < f32::EPSILON);
        assert_eq!(AudioFrame::new(vec![], 0).duration_secs(), 0.0);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());

        token.clear();
        assert!(!clone.is_cancelled());
    }
}
