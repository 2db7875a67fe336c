//! Mock providers and decoders.
//!
//! These mocks stand in for real engine bindings: the STT mock runs the
//! full streaming machine over a scripted decoder, the TTS mock produces
//! silence of a predictable length. Both honor the operation-table contract
//! (readiness, unsupported operations, cleanup) so conformance tests can
//! run against them.

use std::collections::VecDeque;

use log::warn;

use crate::backend::{ActiveOperations, BackendInfo, CapabilityBackend};
use crate::capability::Capability;
use crate::error::{ModalityError, ModalityResult};
use crate::payload::{Payload, ProcessOptions};
use crate::provider::{ServiceProvider, ServiceRequest};
use crate::streaming::{DecodeOutput, StreamConfig, StreamDecoder, StreamManager};

/// Sample rate the mock engines require.
pub const MOCK_ENGINE_RATE: u32 = 16000;

/// A stream decoder that replays a script, one entry per non-empty decode.
///
/// Once the script runs out it falls back to `segment-<n>`. An empty sample
/// slice produces empty text and does not consume the script.
pub struct ScriptedDecoder {
    script: VecDeque<String>,
    decodes: usize,
    endpoint: bool,
    resets: usize,
}

impl ScriptedDecoder {
    /// Create a decoder replaying `script`.
    pub fn new(script: impl IntoIterator<Item = String>) -> Self {
        Self {
            script: script.into_iter().collect(),
            decodes: 0,
            endpoint: false,
            resets: 0,
        }
    }

    /// Make `is_endpoint` report `value` from now on.
    pub fn set_endpoint(&mut self, value: bool) {
        self.endpoint = value;
    }

    /// Number of times `reset` was called.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl StreamDecoder for ScriptedDecoder {
    fn decode(&mut self, samples: &[f32], _is_final: bool) -> ModalityResult<Payload> {
        if samples.is_empty() {
            return Ok(Payload::text(""));
        }
        self.decodes += 1;
        let text = self
            .script
            .pop_front()
            .unwrap_or_else(|| format!("segment-{}", self.decodes));
        Ok(Payload::Text(text))
    }

    fn is_endpoint(&self) -> bool {
        self.endpoint
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Streaming STT backend over the scripted decoder.
pub struct MockSttBackend {
    current_model: Option<String>,
    streams: StreamManager,
    script: Vec<String>,
    active: ActiveOperations,
}

impl MockSttBackend {
    /// Create an uninitialized backend; new streams replay `script`.
    pub fn new(script: Vec<String>) -> Self {
        Self {
            current_model: None,
            streams: StreamManager::new(MOCK_ENGINE_RATE),
            script,
            active: ActiveOperations::new(),
        }
    }

    /// Counter shared with in-flight batch operations.
    pub fn active_operations(&self) -> ActiveOperations {
        self.active.clone()
    }

    fn ensure_ready(&self) -> ModalityResult<()> {
        if self.current_model.is_none() {
            return Err(ModalityError::not_ready("no model loaded"));
        }
        Ok(())
    }
}

impl CapabilityBackend for MockSttBackend {
    fn initialize(&mut self, model_path: &str) -> ModalityResult<()> {
        if model_path.is_empty() {
            return Err(ModalityError::ModelLoad(
                "mock stt engine needs a model path".to_string(),
            ));
        }
        self.current_model = Some(model_path.to_string());
        Ok(())
    }

    fn process(&mut self, input: Payload, options: &ProcessOptions) -> ModalityResult<Payload> {
        self.ensure_ready()?;
        let _guard = self.active.begin();

        if options.cancel.is_cancelled() {
            return Ok(Payload::text(""));
        }
        let frame = input.into_audio()?;
        Ok(Payload::text(format!(
            "transcribed {} samples",
            frame.len()
        )))
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            is_ready: self.current_model.is_some(),
            supports_streaming: true,
            current_model: self.current_model.clone(),
        }
    }

    fn cleanup(&mut self) -> ModalityResult<()> {
        let in_flight = self.active.count();
        if in_flight > 0 {
            warn!(
                "mock stt cleanup requested with {} operation(s) in flight",
                in_flight
            );
        }
        self.streams.destroy_all();
        self.current_model = None;
        Ok(())
    }

    fn create_stream(&mut self, config: StreamConfig) -> ModalityResult<String> {
        self.ensure_ready()?;
        let decoder = ScriptedDecoder::new(self.script.clone());
        Ok(self.streams.create(config, Box::new(decoder)))
    }

    fn feed_audio(
        &mut self,
        stream_id: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> ModalityResult<()> {
        self.ensure_ready()?;
        self.streams.feed(stream_id, samples, sample_rate)
    }

    fn is_stream_ready(&self, stream_id: &str) -> ModalityResult<bool> {
        self.ensure_ready()?;
        self.streams.is_ready(stream_id)
    }

    fn decode_stream(&mut self, stream_id: &str) -> ModalityResult<DecodeOutput> {
        self.ensure_ready()?;
        self.streams.decode(stream_id)
    }

    fn is_endpoint(&self, stream_id: &str) -> ModalityResult<bool> {
        self.ensure_ready()?;
        self.streams.is_endpoint(stream_id)
    }

    fn finish_stream_input(&mut self, stream_id: &str) -> ModalityResult<()> {
        self.ensure_ready()?;
        self.streams.finish_input(stream_id)
    }

    fn reset_stream(&mut self, stream_id: &str) -> ModalityResult<()> {
        self.ensure_ready()?;
        self.streams.reset(stream_id)
    }

    fn destroy_stream(&mut self, stream_id: &str) -> ModalityResult<()> {
        self.ensure_ready()?;
        self.streams.destroy(stream_id)
    }
}

/// Provider handing out [`MockSttBackend`] instances.
///
/// Accepts any request with a non-empty identifier, so tests can probe the
/// default-request path with a second, default-accepting provider.
#[derive(Debug)]
pub struct MockSttProvider {
    name: String,
    priority: i32,
    script: Vec<String>,
}

impl MockSttProvider {
    /// Create a provider with an empty script.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            script: Vec::new(),
        }
    }

    /// Replay `script` in streams created by this provider's backends.
    pub fn with_script(name: impl Into<String>, priority: i32, script: Vec<String>) -> Self {
        Self {
            name: name.into(),
            priority,
            script,
        }
    }
}

impl ServiceProvider for MockSttProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Stt
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_handle(&self, request: &ServiceRequest) -> bool {
        !request.identifier.is_empty()
    }

    fn create(&self, _request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>> {
        Ok(Box::new(MockSttBackend::new(self.script.clone())))
    }
}

/// Batch TTS backend producing silence: 160 samples per input character at
/// the mock engine rate.
pub struct MockTtsBackend {
    current_model: Option<String>,
    active: ActiveOperations,
}

impl MockTtsBackend {
    /// Create an uninitialized backend.
    pub fn new() -> Self {
        Self {
            current_model: None,
            active: ActiveOperations::new(),
        }
    }

    /// Counter shared with in-flight batch operations.
    pub fn active_operations(&self) -> ActiveOperations {
        self.active.clone()
    }
}

impl Default for MockTtsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityBackend for MockTtsBackend {
    fn initialize(&mut self, model_path: &str) -> ModalityResult<()> {
        self.current_model = Some(model_path.to_string());
        Ok(())
    }

    fn process(&mut self, input: Payload, options: &ProcessOptions) -> ModalityResult<Payload> {
        if self.current_model.is_none() {
            return Err(ModalityError::not_ready("no voice loaded"));
        }
        let _guard = self.active.begin();

        let text = input.into_text()?;
        let mut samples = Vec::new();
        for _ in text.chars() {
            if options.cancel.is_cancelled() {
                break;
            }
            samples.extend(std::iter::repeat(0.0f32).take(160));
        }
        Ok(Payload::audio(samples, MOCK_ENGINE_RATE))
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            is_ready: self.current_model.is_some(),
            supports_streaming: false,
            current_model: self.current_model.clone(),
        }
    }

    fn cleanup(&mut self) -> ModalityResult<()> {
        let in_flight = self.active.count();
        if in_flight > 0 {
            warn!(
                "mock tts cleanup requested with {} operation(s) in flight",
                in_flight
            );
        }
        self.current_model = None;
        Ok(())
    }
}

/// Provider handing out [`MockTtsBackend`] instances. Accepts every
/// request, including the empty "default" identifier.
#[derive(Debug)]
pub struct MockTtsProvider {
    name: String,
    priority: i32,
}

impl MockTtsProvider {
    /// Create a provider with the given name and priority.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

impl ServiceProvider for MockTtsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Tts
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_handle(&self, _request: &ServiceRequest) -> bool {
        true
    }

    fn create(&self, _request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>> {
        Ok(Box::new(MockTtsBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    #[test]
    fn test_stt_requires_model() {
        let mut backend = MockSttBackend::new(vec![]);
        let err = backend.create_stream(StreamConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::BackendNotReady);

        let err = backend.initialize("").unwrap_err();
        assert_eq!(err.code(), ResultCode::ModelLoadFailed);
    }

    #[test]
    fn test_scripted_decoder_replays_then_counts() {
        let mut decoder = ScriptedDecoder::new(["hello world".to_string()]);
        let samples = vec![0.1f32; 16000];

        assert_eq!(
            decoder.decode(&samples, false).unwrap(),
            Payload::text("hello world")
        );
        assert_eq!(
            decoder.decode(&samples, false).unwrap(),
            Payload::text("segment-2")
        );
        assert_eq!(decoder.decode(&[], false).unwrap(), Payload::text(""));
    }

    #[test]
    fn test_tts_output_length() {
        let mut backend = MockTtsBackend::new();
        backend.initialize("voice").unwrap();

        let out = backend
            .process(Payload::text("hey"), &ProcessOptions::default())
            .unwrap();
        let frame = out.into_audio().unwrap();
        assert_eq!(frame.len(), 3 * 160);
        assert_eq!(frame.sample_rate, MOCK_ENGINE_RATE);
    }

    #[test]
    fn test_tts_cancellation_stops_early() {
        let mut backend = MockTtsBackend::new();
        backend.initialize("voice").unwrap();

        let options = ProcessOptions::default();
        options.cancel.cancel();
        let out = backend
            .process(Payload::text("a very long sentence"), &options)
            .unwrap();
        assert!(out.into_audio().unwrap().is_empty());
    }
}
