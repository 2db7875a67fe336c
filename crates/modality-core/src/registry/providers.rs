//! Per-capability provider tables and request resolution.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::capability::Capability;
use crate::error::{ModalityError, ModalityResult};
use crate::provider::{ServiceProvider, ServiceRequest};

/// Holds, per capability, the registered providers in resolution order.
///
/// Lists are kept sorted by priority descending; equal priorities preserve
/// registration order (the sort is stable), so a primary backend registered
/// early pre-empts a fallback registered later without either knowing about
/// the other.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<Capability, Vec<Arc<dyn ServiceProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Fails with `AlreadyRegistered` when a provider
    /// with the same `(name, capability)` pair is live.
    pub fn register(&mut self, provider: Arc<dyn ServiceProvider>) -> ModalityResult<()> {
        let capability = provider.capability();
        let list = self.providers.entry(capability).or_default();

        if list.iter().any(|p| p.name() == provider.name()) {
            return Err(ModalityError::already_registered(format!(
                "provider '{}' for {}",
                provider.name(),
                capability
            )));
        }

        info!(
            "registered provider '{}' for {} (priority {})",
            provider.name(),
            capability,
            provider.priority()
        );
        list.push(provider);
        list.sort_by_key(|p| Reverse(p.priority()));
        Ok(())
    }

    /// Remove a provider by name and capability. Fails with `NotFound` if
    /// absent.
    pub fn unregister(&mut self, name: &str, capability: Capability) -> ModalityResult<()> {
        let list = self.providers.get_mut(&capability);
        let position = list
            .as_ref()
            .and_then(|l| l.iter().position(|p| p.name() == name));

        match (list, position) {
            (Some(list), Some(index)) => {
                list.remove(index);
                info!("unregistered provider '{}' for {}", name, capability);
                Ok(())
            }
            _ => Err(ModalityError::not_found(format!(
                "provider '{}' for {}",
                name, capability
            ))),
        }
    }

    /// Provider names for a capability, in resolution order.
    pub fn list(&self, capability: Capability) -> Vec<String> {
        self.providers
            .get(&capability)
            .map(|l| l.iter().map(|p| p.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Number of providers registered for a capability.
    pub fn count(&self, capability: Capability) -> usize {
        self.providers.get(&capability).map_or(0, Vec::len)
    }

    /// Capabilities with at least one registered provider, sorted.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .providers
            .iter()
            .filter(|(_, l)| !l.is_empty())
            .map(|(c, _)| *c)
            .collect();
        caps.sort();
        caps
    }

    /// Snapshot of the resolution-ordered providers for a capability.
    ///
    /// The clones are cheap (`Arc`); callers that want to evaluate
    /// `can_handle` outside a lock resolve against the snapshot.
    pub fn providers_for(&self, capability: Capability) -> Vec<Arc<dyn ServiceProvider>> {
        self.providers
            .get(&capability)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a request to the first provider, in priority order, whose
    /// `can_handle` accepts it.
    ///
    /// Only providers registered for exactly `request.capability` are
    /// consulted. A provider that wants to serve as the capability's default
    /// accepts empty identifiers in its own `can_handle`. When nothing
    /// matches, fails with `NoProviderAvailable`.
    pub fn resolve(&self, request: &ServiceRequest) -> ModalityResult<Arc<dyn ServiceProvider>> {
        resolve_from(&self.providers_for(request.capability), request)
    }
}

/// Resolve `request` against an already-snapshotted, resolution-ordered
/// provider list.
pub(crate) fn resolve_from(
    providers: &[Arc<dyn ServiceProvider>],
    request: &ServiceRequest,
) -> ModalityResult<Arc<dyn ServiceProvider>> {
    for provider in providers {
        if provider.can_handle(request) {
            debug!(
                "resolved {} request '{}' to provider '{}'",
                request.capability,
                request.identifier,
                provider.name()
            );
            return Ok(Arc::clone(provider));
        }
    }

    Err(ModalityError::NoProviderAvailable {
        capability: request.capability,
        identifier: request.identifier.clone(),
    })
}

impl ProviderRegistry {
    /// Drop every provider. Test-support path.
    pub fn clear(&mut self) {
        self.providers.clear();
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(Capability, usize)> = self
            .providers
            .iter()
            .map(|(c, l)| (*c, l.len()))
            .collect();
        counts.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CapabilityBackend;
    use crate::error::ResultCode;

    #[derive(Debug)]
    struct NamedProvider {
        name: &'static str,
        capability: Capability,
        priority: i32,
        accept_default: bool,
    }

    impl NamedProvider {
        fn arc(name: &'static str, capability: Capability, priority: i32) -> Arc<dyn ServiceProvider> {
            Arc::new(Self {
                name,
                capability,
                priority,
                accept_default: false,
            })
        }
    }

    impl ServiceProvider for NamedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_handle(&self, request: &ServiceRequest) -> bool {
            if request.identifier.is_empty() {
                self.accept_default
            } else {
                true
            }
        }

        fn create(&self, _request: &ServiceRequest) -> ModalityResult<Box<dyn CapabilityBackend>> {
            Err(ModalityError::internal("test provider creates nothing"))
        }
    }

    #[test]
    fn test_priority_ordering() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("fallback", Capability::Stt, 50))
            .unwrap();
        registry
            .register(NamedProvider::arc("primary", Capability::Stt, 100))
            .unwrap();

        assert_eq!(registry.list(Capability::Stt), ["primary", "fallback"]);
    }

    #[test]
    fn test_equal_priority_preserves_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("first", Capability::Tts, 10))
            .unwrap();
        registry
            .register(NamedProvider::arc("second", Capability::Tts, 10))
            .unwrap();
        registry
            .register(NamedProvider::arc("highest", Capability::Tts, 20))
            .unwrap();

        assert_eq!(
            registry.list(Capability::Tts),
            ["highest", "first", "second"]
        );
    }

    #[test]
    fn test_duplicate_name_same_capability() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("engine", Capability::Stt, 0))
            .unwrap();

        let err = registry
            .register(NamedProvider::arc("engine", Capability::Stt, 0))
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::AlreadyRegistered);

        // Same name under a different capability is a different provider.
        registry
            .register(NamedProvider::arc("engine", Capability::Tts, 0))
            .unwrap();
    }

    #[test]
    fn test_resolve_capability_isolation() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("stt-only", Capability::Stt, 100))
            .unwrap();

        let err = registry
            .resolve(&ServiceRequest::new("model.bin", Capability::Vad))
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::NoProviderAvailable);
    }

    #[test]
    fn test_resolve_honors_can_handle() {
        let mut registry = ProviderRegistry::new();
        // High priority but rejects default requests.
        registry
            .register(NamedProvider::arc("picky", Capability::Stt, 100))
            .unwrap();
        // Lower priority, acts as the capability default.
        registry
            .register(Arc::new(NamedProvider {
                name: "default",
                capability: Capability::Stt,
                priority: 50,
                accept_default: true,
            }))
            .unwrap();

        let provider = registry
            .resolve(&ServiceRequest::new("model.bin", Capability::Stt))
            .unwrap();
        assert_eq!(provider.name(), "picky");

        let provider = registry
            .resolve(&ServiceRequest::default_for(Capability::Stt))
            .unwrap();
        assert_eq!(provider.name(), "default");
    }

    #[test]
    fn test_unregister() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("engine", Capability::Llm, 0))
            .unwrap();

        registry.unregister("engine", Capability::Llm).unwrap();
        assert_eq!(registry.count(Capability::Llm), 0);

        let err = registry.unregister("engine", Capability::Llm).unwrap_err();
        assert_eq!(err.code(), ResultCode::NotFound);
    }

    #[test]
    fn test_capabilities_listing() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(NamedProvider::arc("a", Capability::Vad, 0))
            .unwrap();
        registry
            .register(NamedProvider::arc("b", Capability::Stt, 0))
            .unwrap();

        assert_eq!(
            registry.capabilities(),
            vec![Capability::Stt, Capability::Vad]
        );
    }
}
