//! Provider contract and capability requests.
//!
//! A [`ServiceProvider`] is one concrete engine binding for one capability.
//! The registry holds providers as trait objects and resolves a
//! [`ServiceRequest`] to the first provider, in priority order, whose
//! [`ServiceProvider::can_handle`] predicate accepts it.

use serde::{Deserialize, Serialize};

use crate::backend::CapabilityBackend;
use crate::capability::Capability;
use crate::error::ModalityResult;

/// A request for a capability, constructed per resolution call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Model path or id. May be empty, meaning "give me the capability's
    /// default".
    pub identifier: String,
    /// Requested capability.
    pub capability: Capability,
}

impl ServiceRequest {
    /// Create a request for `capability` with the given identifier.
    pub fn new(identifier: impl Into<String>, capability: Capability) -> Self {
        Self {
            identifier: identifier.into(),
            capability,
        }
    }

    /// Create a "default" request (empty identifier).
    pub fn default_for(capability: Capability) -> Self {
        Self::new("", capability)
    }

    /// Whether this request asks for the capability's default provider.
    pub fn is_default(&self) -> bool {
        self.identifier.is_empty()
    }
}

/// One concrete engine binding registered against a capability.
///
/// Providers are cheap, stateless factories; per-model state lives in the
/// backends they create. A provider acting as its capability's default
/// should accept empty identifiers in `can_handle`.
pub trait ServiceProvider: Send + Sync + std::fmt::Debug {
    /// Provider name, unique per capability.
    fn name(&self) -> &str;

    /// The capability this provider serves.
    fn capability(&self) -> Capability;

    /// Resolution priority; higher wins. Ties preserve registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this provider can serve the request. Only consulted for
    /// requests matching [`ServiceProvider::capability`].
    fn can_handle(&self, request: &ServiceRequest) -> bool;

    /// Instantiate a backend for the request. The caller owns the returned
    /// backend exclusively until it drops it.
    fn create(&self, request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>>;
}
