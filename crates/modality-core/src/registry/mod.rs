//! Capability and module registries.
//!
//! The registry is the one truly shared, mutable, long-lived structure in
//! the runtime. It maps capabilities to ordered provider lists, tracks
//! module records, and resolves requests to concrete providers.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`modules`] | Module records, at-most-once registration per id |
//! | [`providers`] | Per-capability provider tables and resolution |
//!
//! ## Usage
//!
//! Most callers go through the process-wide registry:
//!
//! ```rust
//! use modality_core::capability::Capability;
//! use modality_core::registry;
//!
//! let names = registry::list_providers(Capability::Stt);
//! ```
//!
//! Embedders and tests can also hold a private [`Registry`] instance; the
//! global functions below are thin wrappers around one shared instance
//! behind a single mutex (one lock for the whole registry — provider lists
//! are small and mutation is registration-time only, never hot-path).

mod modules;
mod providers;

pub use modules::{ModuleInfo, ModuleRegistry};
pub use providers::ProviderRegistry;

use std::sync::{Mutex, OnceLock};

use crate::backend::CapabilityBackend;
use crate::capability::Capability;
use crate::error::ModalityResult;
use crate::provider::{ServiceProvider, ServiceRequest};
use std::sync::Arc;

/// Combined module + provider registry behind one lock scope.
#[derive(Debug, Default)]
pub struct Registry {
    modules: ModuleRegistry,
    providers: ProviderRegistry,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module record. Fails with `AlreadyRegistered` on a live id.
    pub fn register_module(&mut self, info: ModuleInfo) -> ModalityResult<()> {
        self.modules.register(info)
    }

    /// Remove a module record. Does not unregister its providers.
    pub fn unregister_module(&mut self, id: &str) -> ModalityResult<()> {
        self.modules.unregister(id)
    }

    /// Look up a module record.
    pub fn module(&self, id: &str) -> Option<ModuleInfo> {
        self.modules.get(id).cloned()
    }

    /// All module records, ordered by id.
    pub fn list_modules(&self) -> Vec<ModuleInfo> {
        self.modules.list()
    }

    /// Register a provider. Fails with `AlreadyRegistered` on a live
    /// `(name, capability)` pair.
    pub fn register_provider(&mut self, provider: Arc<dyn ServiceProvider>) -> ModalityResult<()> {
        self.providers.register(provider)
    }

    /// Remove a provider by name and capability.
    pub fn unregister_provider(&mut self, name: &str, capability: Capability) -> ModalityResult<()> {
        self.providers.unregister(name, capability)
    }

    /// Provider names for a capability, in resolution order.
    pub fn list_providers(&self, capability: Capability) -> Vec<String> {
        self.providers.list(capability)
    }

    /// Number of providers for a capability.
    pub fn provider_count(&self, capability: Capability) -> usize {
        self.providers.count(capability)
    }

    /// Capabilities with at least one provider.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.providers.capabilities()
    }

    /// Resolve a request to a provider.
    pub fn resolve(&self, request: &ServiceRequest) -> ModalityResult<Arc<dyn ServiceProvider>> {
        self.providers.resolve(request)
    }

    /// Resolve a request and instantiate a backend from the winning
    /// provider.
    pub fn create_backend(
        &self,
        request: &ServiceRequest,
    ) -> ModalityResult<Box<dyn CapabilityBackend>> {
        self.resolve(request)?.create(request)
    }

    /// Drop all modules and providers. Test-support path.
    pub fn clear(&mut self) {
        self.modules.clear();
        self.providers.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Process-wide registry
// ─────────────────────────────────────────────────────────────────────────────

static GLOBAL: OnceLock<Mutex<Registry>> = OnceLock::new();

fn global() -> &'static Mutex<Registry> {
    GLOBAL.get_or_init(|| Mutex::new(Registry::new()))
}

fn with_global<T>(f: impl FnOnce(&mut Registry) -> T) -> T {
    let mut registry = global().lock().expect("registry mutex poisoned");
    f(&mut registry)
}

/// Register a module with the process-wide registry.
pub fn register_module(info: ModuleInfo) -> ModalityResult<()> {
    with_global(|r| r.register_module(info))
}

/// Unregister a module from the process-wide registry.
///
/// Providers contributed by the module are not removed; the module
/// unregisters them explicitly before unregistering itself.
pub fn unregister_module(id: &str) -> ModalityResult<()> {
    with_global(|r| r.unregister_module(id))
}

/// Look up a module record in the process-wide registry.
pub fn module(id: &str) -> Option<ModuleInfo> {
    with_global(|r| r.module(id))
}

/// List module records in the process-wide registry.
pub fn list_modules() -> Vec<ModuleInfo> {
    with_global(|r| r.list_modules())
}

/// Register a provider with the process-wide registry.
pub fn register_provider(provider: Arc<dyn ServiceProvider>) -> ModalityResult<()> {
    with_global(|r| r.register_provider(provider))
}

/// Unregister a provider from the process-wide registry.
pub fn unregister_provider(name: &str, capability: Capability) -> ModalityResult<()> {
    with_global(|r| r.unregister_provider(name, capability))
}

/// Provider names for a capability in the process-wide registry.
pub fn list_providers(capability: Capability) -> Vec<String> {
    with_global(|r| r.list_providers(capability))
}

/// Number of providers for a capability in the process-wide registry.
pub fn provider_count(capability: Capability) -> usize {
    with_global(|r| r.provider_count(capability))
}

/// Resolve a request against the process-wide registry.
///
/// The provider list is snapshotted under the registry lock and the
/// `can_handle` predicates run outside it, so provider code never executes
/// while the lock is held.
pub fn resolve(request: &ServiceRequest) -> ModalityResult<Arc<dyn ServiceProvider>> {
    let snapshot = with_global(|r| r.providers.providers_for(request.capability));
    providers::resolve_from(&snapshot, request)
}

/// Resolve a request against the process-wide registry and instantiate a
/// backend from the winning provider.
pub fn create_backend(request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>> {
    resolve(request)?.create(request)
}

/// Drop everything in the process-wide registry.
///
/// Test-only reset hook; production code never tears the registry down
/// mid-process.
#[doc(hidden)]
pub fn reset_global_for_tests() {
    if let Some(mutex) = GLOBAL.get() {
        mutex.lock().expect("registry mutex poisoned").clear();
    }
}
