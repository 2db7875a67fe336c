//! Unified error types for the modality-core public API.
//!
//! Every fallible operation in this crate returns [`ModalityResult`]. The
//! error type carries a human-readable detail string; the closed
//! [`ResultCode`] enumeration is what crosses the FFI boundary, where the
//! detail string travels separately through the last-error accessor.
//!
//! Internal modules may grow their own error types, but must convert to
//! `ModalityError` at module boundaries.

use thiserror::Error;

use crate::capability::Capability;

/// The canonical error type for modality-core public API.
#[derive(Error, Debug)]
pub enum ModalityError {
    /// A module or provider with the same identity is already registered.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// A module, provider, stream, or model was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// No registered provider accepted the request.
    #[error("no provider available for {capability} request '{identifier}'")]
    NoProviderAvailable {
        /// Requested capability.
        capability: Capability,
        /// Request identifier (may be empty for "default").
        identifier: String,
    },

    /// A required argument was null at the FFI boundary.
    #[error("null argument: {0}")]
    NullArgument(&'static str),

    /// Allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// The backend could not be constructed.
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    /// The model file could not be loaded.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Operation on a destroyed or unknown handle.
    #[error("invalid handle: {0}")]
    InvalidHandle(u64),

    /// Operation requires a loaded model.
    #[error("backend not ready: {0}")]
    BackendNotReady(String),

    /// The backend does not implement the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Malformed input payload, configuration, or argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Contained panic or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for modality-core.
pub type ModalityResult<T> = Result<T, ModalityError>;

/// Closed result-code enumeration returned across the FFI boundary.
///
/// The enumeration carries no payload; callers retrieve the detail string
/// through the boundary layer's last-error accessor.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success = 0,
    AlreadyRegistered = 1,
    NotFound = 2,
    NoProviderAvailable = 3,
    NullArgument = 4,
    OutOfMemory = 5,
    BackendInitFailed = 6,
    ModelLoadFailed = 7,
    InvalidHandle = 8,
    BackendNotReady = 9,
    Unsupported = 10,
    InvalidInput = 11,
    InternalError = 12,
}

impl ModalityError {
    /// The result code this error maps to at the FFI boundary.
    pub fn code(&self) -> ResultCode {
        match self {
            ModalityError::AlreadyRegistered(_) => ResultCode::AlreadyRegistered,
            ModalityError::NotFound(_) => ResultCode::NotFound,
            ModalityError::NoProviderAvailable { .. } => ResultCode::NoProviderAvailable,
            ModalityError::NullArgument(_) => ResultCode::NullArgument,
            ModalityError::OutOfMemory => ResultCode::OutOfMemory,
            ModalityError::BackendInit(_) => ResultCode::BackendInitFailed,
            ModalityError::ModelLoad(_) => ResultCode::ModelLoadFailed,
            ModalityError::InvalidHandle(_) => ResultCode::InvalidHandle,
            ModalityError::BackendNotReady(_) => ResultCode::BackendNotReady,
            ModalityError::Unsupported(_) => ResultCode::Unsupported,
            ModalityError::InvalidInput(_) => ResultCode::InvalidInput,
            ModalityError::Internal(_) => ResultCode::InternalError,
        }
    }

    /// Create an "already registered" error.
    pub fn already_registered(what: impl Into<String>) -> Self {
        ModalityError::AlreadyRegistered(what.into())
    }

    /// Create a "not found" error.
    pub fn not_found(what: impl Into<String>) -> Self {
        ModalityError::NotFound(what.into())
    }

    /// Create a "backend not ready" error.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        ModalityError::BackendNotReady(msg.into())
    }

    /// Create an "unsupported" error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        ModalityError::Unsupported(msg.into())
    }

    /// Create an "invalid input" error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ModalityError::InvalidInput(msg.into())
    }

    /// Create an "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        ModalityError::Internal(msg.into())
    }
}

impl ResultCode {
    /// Integer value as seen by C callers.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModalityError::not_found("stream 'stream-3'");
        assert_eq!(err.to_string(), "not found: stream 'stream-3'");

        let err = ModalityError::NoProviderAvailable {
            capability: Capability::Stt,
            identifier: "model.bin".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no provider available for stt request 'model.bin'"
        );
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(
            ModalityError::already_registered("module 'x'").code(),
            ResultCode::AlreadyRegistered
        );
        assert_eq!(
            ModalityError::InvalidHandle(7).code(),
            ResultCode::InvalidHandle
        );
        assert_eq!(
            ModalityError::unsupported("streaming").code(),
            ResultCode::Unsupported
        );
        assert_eq!(ResultCode::Success.as_i32(), 0);
        assert_eq!(ResultCode::InternalError.as_i32(), 12);
    }
}
