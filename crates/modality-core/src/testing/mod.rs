//! Testing utilities: mock providers, backends, and decoders.
//!
//! Shipped in the library (not behind `cfg(test)`) so integration tests and
//! downstream crates can exercise the registry and streaming machine
//! without a real engine.

mod mocks;

pub use mocks::{
    MockSttBackend, MockSttProvider, MockTtsBackend, MockTtsProvider, ScriptedDecoder,
    MOCK_ENGINE_RATE,
};
