//! Modality Core - capability-oriented on-device inference runtime.
//!
//! Applications request a capability (speech-to-text, text-to-speech,
//! voice-activity-detection, language-model generation) without naming a
//! concrete engine. Engines register [`provider::ServiceProvider`]s; the
//! registry resolves each request to one provider, which instantiates a
//! [`backend::CapabilityBackend`] the caller then drives directly — batch or
//! streaming.
//!
//! ## Quick Start
//!
//! ```rust
//! use modality_core::prelude::*;
//!
//! modality_core::builtin::register().unwrap();
//!
//! let request = ServiceRequest::default_for(Capability::Vad);
//! let mut backend = registry::create_backend(&request).unwrap();
//! backend.initialize("").unwrap();
//!
//! let verdict = backend
//!     .process(Payload::audio(vec![0.0; 16000], 16000), &ProcessOptions::default())
//!     .unwrap();
//! assert_eq!(verdict, Payload::Flag(false));
//! ```
//!
//! ## Module Organization
//!
//! ### Registry & Contract
//! - [`registry`] - capability/module registries and the process-wide instance
//! - [`provider`] - provider trait and capability requests
//! - [`backend`] - the uniform backend operation table
//!
//! ### Data Types
//! - [`capability`] - the closed capability enumeration
//! - [`payload`] - capability-agnostic payload values and options
//! - [`error`] - error type and the closed FFI result-code enumeration
//!
//! ### Streaming
//! - [`streaming`] - session state machine for incremental decode
//! - [`audio`] - PCM resampling
//!
//! ### Providers
//! - [`builtin`] - providers shipped with the runtime (energy VAD)
//!
//! ## Threading
//!
//! Everything runs synchronously on the calling thread. The registry is
//! internally serialized and safe from any thread; a backend and its
//! streams belong to whoever holds the backend, and per-stream call
//! serialization is the caller's responsibility.

pub mod audio;
pub mod backend;
pub mod builtin;
pub mod capability;
pub mod error;
pub mod payload;
pub mod provider;
pub mod registry;
pub mod streaming;

/// Testing utilities (mocks). Not part of the stable API surface.
#[doc(hidden)]
pub mod testing;

pub use backend::{ActiveOperations, BackendInfo, CapabilityBackend, OperationGuard};
pub use capability::Capability;
pub use error::{ModalityError, ModalityResult, ResultCode};
pub use payload::{AudioFrame, CancellationToken, Payload, ProcessOptions};
pub use provider::{ServiceProvider, ServiceRequest};
pub use registry::{ModuleInfo, Registry};
pub use streaming::{DecodeOutput, StreamConfig, StreamDecoder, StreamManager, StreamSession};

/// Common imports for modality-core users.
pub mod prelude {
    pub use crate::backend::{BackendInfo, CapabilityBackend};
    pub use crate::capability::Capability;
    pub use crate::error::{ModalityError, ModalityResult, ResultCode};
    pub use crate::payload::{AudioFrame, CancellationToken, Payload, ProcessOptions};
    pub use crate::provider::{ServiceProvider, ServiceRequest};
    pub use crate::registry;
    pub use crate::registry::ModuleInfo;
    pub use crate::streaming::{DecodeOutput, StreamConfig, StreamDecoder};
}
