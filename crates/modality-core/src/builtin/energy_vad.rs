//! Frame-energy voice activity detection.
//!
//! A model-free VAD provider: audio is scanned in short frames and speech is
//! reported when any frame's RMS energy crosses a threshold. It is the
//! capability's default provider (low priority, accepts every request), so
//! the runtime can answer VAD requests before any neural module registers.

use log::warn;

use crate::backend::{ActiveOperations, BackendInfo, CapabilityBackend};
use crate::capability::Capability;
use crate::error::{ModalityError, ModalityResult};
use crate::payload::{Payload, ProcessOptions};
use crate::provider::{ServiceProvider, ServiceRequest};

/// Frame length used for energy scanning, in milliseconds.
const FRAME_MS: u32 = 30;

/// Default RMS threshold above which a frame counts as speech.
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.01;

/// Backend performing frame-RMS speech detection.
pub struct EnergyVadBackend {
    threshold: f32,
    current_model: Option<String>,
    active: ActiveOperations,
}

impl EnergyVadBackend {
    /// Create a backend with the given RMS threshold.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            current_model: None,
            active: ActiveOperations::new(),
        }
    }

    fn detect(&self, samples: &[f32], sample_rate: u32, options: &ProcessOptions) -> bool {
        if sample_rate == 0 || samples.is_empty() {
            return false;
        }

        let frame_len = ((sample_rate * FRAME_MS) / 1000).max(1) as usize;
        for frame in samples.chunks(frame_len) {
            // Cooperative cancel: stop scanning and report what was seen.
            if options.cancel.is_cancelled() {
                return false;
            }
            let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
            if energy.sqrt() > self.threshold {
                return true;
            }
        }
        false
    }
}

impl CapabilityBackend for EnergyVadBackend {
    /// The detector is model-free; `initialize` records the identifier and
    /// marks the backend ready.
    fn initialize(&mut self, model_path: &str) -> ModalityResult<()> {
        self.current_model = Some(model_path.to_string());
        Ok(())
    }

    fn process(&mut self, input: Payload, options: &ProcessOptions) -> ModalityResult<Payload> {
        if self.current_model.is_none() {
            return Err(ModalityError::not_ready(
                "energy-vad backend has not been initialized",
            ));
        }

        let _guard = self.active.begin();
        let frame = input.into_audio()?;
        let detected = self.detect(&frame.samples, frame.sample_rate, options);
        Ok(Payload::Flag(detected))
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
                "energy-vad cleanup requested with {} operation(s) in flight",
                in_flight
            );
        }
        self.current_model = None;
        Ok(())
    }
}

/// Provider handing out [`EnergyVadBackend`] instances.
#[derive(Debug)]
pub struct EnergyVadProvider {
    threshold: f32,
}

impl EnergyVadProvider {
    /// Create a provider with the default threshold.
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_ENERGY_THRESHOLD,
        }
    }

    /// Create a provider with a custom RMS threshold.
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for EnergyVadProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProvider for EnergyVadProvider {
    fn name(&self) -> &str {
        "energy-vad"
    }

    fn capability(&self) -> Capability {
        Capability::Vad
    }

    /// Low priority: any registered neural VAD pre-empts the energy
    /// detector.
    fn priority(&self) -> i32 {
        10
    }

    /// Model-free, so every request — including the empty "default"
    /// identifier — is acceptable.
    fn can_handle(&self, _request: &ServiceRequest) -> bool {
        true
    }

    fn create(&self, _request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>> {
        Ok(Box::new(EnergyVadBackend::new(self.threshold)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    fn ready_backend() -> EnergyVadBackend {
        let mut backend = EnergyVadBackend::new(DEFAULT_ENERGY_THRESHOLD);
        backend.initialize("").unwrap();
        backend
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.1).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_silence_is_not_speech() {
        let mut backend = ready_backend();
        let out = backend
            .process(
                Payload::audio(vec![0.0; 16000], 16000),
                &ProcessOptions::default(),
            )
            .unwrap();
        assert_eq!(out, Payload::Flag(false));
    }

    #[test]
    fn test_tone_is_speech() {
        let mut backend = ready_backend();
        let out = backend
            .process(
                Payload::audio(tone(16000), 16000),
                &ProcessOptions::default(),
            )
            .unwrap();
        assert_eq!(out, Payload::Flag(true));
    }

    #[test]
    fn test_requires_initialize() {
        let mut backend = EnergyVadBackend::new(DEFAULT_ENERGY_THRESHOLD);
        let err = backend
            .process(
                Payload::audio(tone(16000), 16000),
                &ProcessOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::BackendNotReady);
    }

    #[test]
    fn test_rejects_text_payload() {
        let mut backend = ready_backend();
        let err = backend
            .process(Payload::text("hello"), &ProcessOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidInput);
    }

    #[test]
    fn test_streaming_unsupported() {
        let mut backend = ready_backend();
        let err = backend
            .create_stream(crate::streaming::StreamConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::Unsupported);
        assert!(!backend.info().supports_streaming);
    }

    #[test]
    fn test_cleanup_allows_reinitialize() {
        let mut backend = ready_backend();
        backend.cleanup().unwrap();
        assert!(!backend.info().is_ready);

        backend.initialize("again").unwrap();
        assert!(backend.info().is_ready);
        assert_eq!(backend.info().current_model.as_deref(), Some("again"));
    }
}
