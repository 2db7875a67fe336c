//! Providers shipped with the runtime itself.
//!
//! Native engine crates register their own modules at startup; this module
//! covers what the core can serve with no engine at all. Today that is the
//! model-free energy VAD.

mod energy_vad;

pub use energy_vad::{EnergyVadBackend, EnergyVadProvider, DEFAULT_ENERGY_THRESHOLD};

use std::sync::Arc;

use crate::capability::Capability;
use crate::error::{ModalityError, ModalityResult};
use crate::registry::{self, ModuleInfo};

/// Module id the built-in providers register under.
pub const BUILTIN_MODULE_ID: &str = "modality-builtin";

/// Register the built-in module and its providers with the process-wide
/// registry. Idempotent: calling it again after a successful registration
/// is a no-op success.
pub fn register() -> ModalityResult<()> {
    let info = ModuleInfo::new(
        BUILTIN_MODULE_ID,
        "Modality built-in providers",
        env!("CARGO_PKG_VERSION"),
        [Capability::Vad],
    );

    match registry::register_module(info) {
        Ok(()) => {}
        Err(ModalityError::AlreadyRegistered(_)) => return Ok(()),
        Err(err) => return Err(err),
    }

    registry::register_provider(Arc::new(EnergyVadProvider::new()))
}

/// Unregister the built-in providers, then the module record.
pub fn unregister() -> ModalityResult<()> {
    registry::unregister_provider("energy-vad", Capability::Vad)?;
    registry::unregister_module(BUILTIN_MODULE_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ServiceRequest;

    #[test]
    fn test_register_is_idempotent() {
        register().unwrap();
        register().unwrap();

        let provider =
            registry::resolve(&ServiceRequest::default_for(Capability::Vad)).unwrap();
        assert_eq!(provider.name(), "energy-vad");

        unregister().unwrap();
    }
}
