//! Module records.
//!
//! A module is a named, versioned bundle of providers registered and
//! unregistered as a unit (e.g. "the ONNX backend"). The module registry
//! only tracks the records; provider de-registration is the module's
//! explicit responsibility on the way out.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::{ModalityError, ModalityResult};

/// Identity and contribution of one registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Unique module id (at most one live record per id).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Module version string.
    pub version: String,
    /// Capabilities this module contributes providers for.
    pub capabilities: BTreeSet<Capability>,
}

impl ModuleInfo {
    /// Create a record with the given identity and capability set.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

/// Tracks which modules are registered, enforcing at-most-once per id.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleInfo>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Fails with `AlreadyRegistered` if the id is live.
    pub fn register(&mut self, info: ModuleInfo) -> ModalityResult<()> {
        if self.modules.contains_key(&info.id) {
            return Err(ModalityError::already_registered(format!(
                "module '{}'",
                info.id
            )));
        }
        log::info!(
            "registered module '{}' v{} ({} capabilities)",
            info.id,
            info.version,
            info.capabilities.len()
        );
        self.modules.insert(info.id.clone(), info);
        Ok(())
    }

    /// Remove a module record. Fails with `NotFound` if absent.
    ///
    /// Does not unregister the module's providers; modules unregister their
    /// providers first, then themselves.
    pub fn unregister(&mut self, id: &str) -> ModalityResult<()> {
        match self.modules.remove(id) {
            Some(info) => {
                log::info!("unregistered module '{}' v{}", info.id, info.version);
                Ok(())
            }
            None => Err(ModalityError::not_found(format!("module '{}'", id))),
        }
    }

    /// Look up a module record by id.
    pub fn get(&self, id: &str) -> Option<&ModuleInfo> {
        self.modules.get(id)
    }

    /// Whether a module with this id is live.
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// All live records, ordered by id.
    pub fn list(&self) -> Vec<ModuleInfo> {
        self.modules.values().cloned().collect()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drop every record. Test-support path.
    pub fn clear(&mut self) {
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    fn info(id: &str) -> ModuleInfo {
        ModuleInfo::new(id, "Test module", "1.0.0", [Capability::Stt])
    }

    #[test]
    fn test_double_registration() {
        let mut registry = ModuleRegistry::new();
        registry.register(info("x")).unwrap();

        let err = registry.register(info("x")).unwrap_err();
        assert_eq!(err.code(), ResultCode::AlreadyRegistered);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_then_reregister() {
        let mut registry = ModuleRegistry::new();
        registry.register(info("x")).unwrap();
        registry.unregister("x").unwrap();
        assert!(!registry.contains("x"));

        // The id is free again.
        registry.register(info("x")).unwrap();
    }

    #[test]
    fn test_unregister_missing() {
        let mut registry = ModuleRegistry::new();
        let err = registry.unregister("ghost").unwrap_err();
        assert_eq!(err.code(), ResultCode::NotFound);
    }

    #[test]
    fn test_list_ordered_by_id() {
        let mut registry = ModuleRegistry::new();
        registry.register(info("zeta")).unwrap();
        registry.register(info("alpha")).unwrap();

        let modules = registry.list();
        let ids: Vec<&str> = modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
    }
}
