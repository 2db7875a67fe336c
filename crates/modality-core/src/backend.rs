//! The uniform backend contract.
//!
//! Every provider hands out backends implementing [`CapabilityBackend`] — the
//! same fixed operation set regardless of capability. The registry never
//! inspects engine-specific types; it only resolves providers, and callers
//! only invoke this table. Providers that cannot stream inherit the default
//! streaming implementations, which fail with `Unsupported`.
//!
//! Lifecycle: `initialize` loads a model, `cleanup` releases engine
//! resources while keeping the backend valid for re-`initialize`, and
//! dropping the backend (arena removal over FFI) destroys it outright,
//! tearing down any outstanding streams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ModalityError, ModalityResult};
use crate::payload::{Payload, ProcessOptions};
use crate::streaming::{DecodeOutput, StreamConfig};

/// Snapshot of a backend's state, as reported by [`CapabilityBackend::info`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendInfo {
    /// Whether a model is loaded and batch/stream operations may proceed.
    pub is_ready: bool,
    /// Whether the backend implements the streaming operations.
    pub supports_streaming: bool,
    /// Path or identifier of the currently loaded model, if any.
    pub current_model: Option<String>,
}

/// The fixed operation table every backend exposes.
///
/// Callers own a backend exclusively and must serialize calls per stream id;
/// the table itself performs no internal locking. All streaming operations
/// fail with `BackendNotReady` when no model is loaded and with `NotFound`
/// for unknown stream ids, except `destroy_stream` which is idempotent.
pub trait CapabilityBackend: Send {
    /// Load the model at `model_path` and make the backend ready.
    fn initialize(&mut self, model_path: &str) -> ModalityResult<()>;

    /// Run the capability's batch operation (transcribe, synthesize, detect,
    /// generate) over one payload.
    fn process(&mut self, input: Payload, options: &ProcessOptions) -> ModalityResult<Payload>;

    /// Report readiness, streaming support, and the loaded model.
    fn info(&self) -> BackendInfo;

    /// Release engine resources, keeping the backend valid for a later
    /// `initialize`. Destroys all outstanding streams.
    fn cleanup(&mut self) -> ModalityResult<()>;

    /// Open a new streaming session and return its id.
    fn create_stream(&mut self, _config: StreamConfig) -> ModalityResult<String> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Append audio to a stream, resampling to the engine rate if needed.
    fn feed_audio(
        &mut self,
        _stream_id: &str,
        _samples: &[f32],
        _sample_rate: u32,
    ) -> ModalityResult<()> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Whether the stream has buffered enough audio for a worthwhile decode.
    fn is_stream_ready(&self, _stream_id: &str) -> ModalityResult<bool> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Incrementally decode the buffered audio, clearing the buffer.
    fn decode_stream(&mut self, _stream_id: &str) -> ModalityResult<DecodeOutput> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Engine heuristic for "speech has ended"; `false` when not implemented.
    fn is_endpoint(&self, _stream_id: &str) -> ModalityResult<bool> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Mark that no more audio will be fed; does not itself decode.
    fn finish_stream_input(&mut self, _stream_id: &str) -> ModalityResult<()> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Clear a stream's buffer and finished flag, keeping its id.
    fn reset_stream(&mut self, _stream_id: &str) -> ModalityResult<()> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }

    /// Tear down a stream. Destroying an unknown id is a no-op success.
    fn destroy_stream(&mut self, _stream_id: &str) -> ModalityResult<()> {
        Err(ModalityError::unsupported(
            "streaming is not supported by this backend",
        ))
    }
}

/// Shared count of in-flight batch operations on one backend.
///
/// Long-running backends increment the count for the duration of every batch
/// call through [`ActiveOperations::begin`]; unload paths consult
/// [`ActiveOperations::count`] and warn instead of blocking when operations
/// are still in flight. Clones share the underlying counter.
#[derive(Debug, Clone, Default)]
pub struct ActiveOperations {
    count: Arc<AtomicUsize>,
}

impl ActiveOperations {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations currently in flight.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Mark an operation as started. The returned guard decrements the
    /// count when dropped, on every exit path including panic unwind.
    pub fn begin(&self) -> OperationGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        OperationGuard {
            count: Arc::clone(&self.count),
        }
    }
}

/// Scope guard for one in-flight operation. See [`ActiveOperations`].
#[derive(Debug)]
pub struct OperationGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    struct BatchOnlyBackend;

    impl CapabilityBackend for BatchOnlyBackend {
        fn initialize(&mut self, _model_path: &str) -> ModalityResult<()> {
            Ok(())
        }

        fn process(
            &mut self,
            input: Payload,
            _options: &ProcessOptions,
        ) -> ModalityResult<Payload> {
            Ok(input)
        }

        fn info(&self) -> BackendInfo {
            BackendInfo::default()
        }

        fn cleanup(&mut self) -> ModalityResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_streaming_is_unsupported() {
        let mut backend = BatchOnlyBackend;
        let err = backend.create_stream(StreamConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::Unsupported);

        let err = backend.feed_audio("stream-1", &[0.0; 160], 16000).unwrap_err();
        assert_eq!(err.code(), ResultCode::Unsupported);

        let err = backend.destroy_stream("stream-1").unwrap_err();
        assert_eq!(err.code(), ResultCode::Unsupported);
    }

    #[test]
    fn test_operation_guard_decrements() {
        let ops = ActiveOperations::new();
        assert_eq!(ops.count(), 0);

        {
            let _a = ops.begin();
            let _b = ops.begin();
            assert_eq!(ops.count(), 2);
        }
        assert_eq!(ops.count(), 0);
    }

    #[test]
    fn test_operation_guard_decrements_on_unwind() {
        let ops = ActiveOperations::new();
        let cloned = ops.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.begin();
            panic!("engine blew up mid-operation");
        });

        assert!(result.is_err());
        assert_eq!(ops.count(), 0);
    }
}
