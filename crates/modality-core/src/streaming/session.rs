//! One in-progress streaming session.
//!
//! A [`StreamSession`] owns the audio accumulation buffer and an
//! engine-opaque [`StreamDecoder`]. Sessions move through the phases
//! Accepting → Ready → (decode) → Accepting/Ready …, and reach Finalized
//! after the decode that follows [`StreamSession::finish_input`]. The
//! session never talks to the wire format or the registry; the
//! [`StreamManager`](super::StreamManager) owns the id map and feeds
//! sessions audio already converted to the engine rate.

use serde::{Deserialize, Serialize};

use crate::error::ModalityResult;
use crate::payload::Payload;

/// Default minimum buffered audio before a decode is worthwhile, in seconds.
///
/// Streaming engines have far lower per-call overhead when given at least
/// about a second of audio rather than being invoked on every small chunk.
pub const DEFAULT_MIN_READY_SECS: f32 = 1.0;

/// Configuration for one streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Language hint passed through to the engine decoder, if any.
    pub language: Option<String>,
    /// Minimum buffered duration before [`StreamSession::is_ready`] turns
    /// true (the finished flag overrides this).
    pub min_ready_secs: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            language: None,
            min_ready_secs: DEFAULT_MIN_READY_SECS,
        }
    }
}

/// Result of one incremental decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    /// Recognized text (STT) or synthesized audio (TTS-style streams).
    pub payload: Payload,
    /// True when this decode covered the final audio of the stream.
    pub is_final: bool,
}

/// Engine-opaque incremental decoder state behind a streaming session.
///
/// One decoder instance is created per stream and lives until the stream is
/// destroyed or the backend tears down.
pub trait StreamDecoder: Send {
    /// Decode one batch of buffered samples, already at the engine rate.
    ///
    /// Called with an empty slice when a decode is requested with nothing
    /// buffered; implementations return their empty output in that case.
    fn decode(&mut self, samples: &[f32], is_final: bool) -> ModalityResult<Payload>;

    /// Engine heuristic for "speech has ended".
    fn is_endpoint(&self) -> bool {
        false
    }

    /// Called on stream reset. Engines may recreate decoder state here;
    /// the default keeps it.
    fn reset(&mut self) {}
}

/// Observable phase of a session. Derived from the buffer and flags rather
/// than stored, so it cannot drift from the real state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accumulating audio below the readiness threshold.
    Accepting,
    /// Enough audio buffered (or input finished) for a worthwhile decode.
    Ready,
    /// The decode covering the final audio has run.
    Finalized,
}

/// Per-stream state: audio buffer, language, flags, and the engine decoder.
pub struct StreamSession {
    stream_id: String,
    audio_buffer: Vec<f32>,
    language: Option<String>,
    sample_rate: u32,
    min_ready_samples: usize,
    input_finished: bool,
    finalized: bool,
    decoder: Box<dyn StreamDecoder>,
}

impl StreamSession {
    /// Create a session owning `decoder`, buffering at `sample_rate`.
    pub fn new(
        stream_id: impl Into<String>,
        config: StreamConfig,
        sample_rate: u32,
        decoder: Box<dyn StreamDecoder>,
    ) -> Self {
        let min_ready_samples =
            (config.min_ready_secs.max(0.0) * sample_rate as f32).round() as usize;
        Self {
            stream_id: stream_id.into(),
            audio_buffer: Vec::new(),
            language: config.language,
            sample_rate,
            min_ready_samples,
            input_finished: false,
            finalized: false,
            decoder,
        }
    }

    /// The session's id.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Language hint this session was created with.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Sample rate the buffer accumulates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples currently buffered.
    pub fn buffered_samples(&self) -> usize {
        self.audio_buffer.len()
    }

    /// Append samples already converted to the session's rate.
    pub fn feed(&mut self, samples: &[f32]) {
        self.audio_buffer.extend_from_slice(samples);
    }

    /// Whether enough audio is buffered for a worthwhile decode, or the
    /// input was marked finished.
    pub fn is_ready(&self) -> bool {
        self.input_finished || self.audio_buffer.len() >= self.min_ready_samples
    }

    /// Mark that no more audio will arrive. Does not trigger a decode.
    pub fn finish_input(&mut self) {
        self.input_finished = true;
    }

    /// Whether the input was marked finished.
    pub fn input_finished(&self) -> bool {
        self.input_finished
    }

    /// Current phase, derived from buffer and flags.
    pub fn phase(&self) -> SessionPhase {
        if self.finalized {
            SessionPhase::Finalized
        } else if self.is_ready() {
            SessionPhase::Ready
        } else {
            SessionPhase::Accepting
        }
    }

    /// Run the engine decoder over the buffered audio and clear the buffer.
    ///
    /// Previously decoded samples are never resubmitted; a decode with
    /// nothing buffered returns the decoder's empty output.
    pub fn decode(&mut self) -> ModalityResult<DecodeOutput> {
        let is_final = self.input_finished;
        let samples = std::mem::take(&mut self.audio_buffer);
        let payload = match self.decoder.decode(&samples, is_final) {
            Ok(payload) => payload,
            Err(err) => {
                // Failed decodes keep the audio; the caller may retry.
                self.audio_buffer = samples;
                return Err(err);
            }
        };
        if is_final {
            self.finalized = true;
        }
        Ok(DecodeOutput { payload, is_final })
    }

    /// Engine endpoint heuristic; `false` when the engine has none.
    pub fn is_endpoint(&self) -> bool {
        self.decoder.is_endpoint()
    }

    /// Clear the buffer and flags, keeping the id and (by default) the
    /// engine decoder state.
    pub fn reset(&mut self) {
        self.audio_buffer.clear();
        self.input_finished = false;
        self.finalized = false;
        self.decoder.reset();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("stream_id", &self.stream_id)
            .field("buffered_samples", &self.audio_buffer.len())
            .field("sample_rate", &self.sample_rate)
            .field("input_finished", &self.input_finished)
            .field("phase", &self.phase())
            .finish()
    }
}
