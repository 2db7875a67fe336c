//! Streaming session state machine.
//!
//! Providers that cannot transcribe or synthesize in one shot run streaming
//! sessions: audio is fed incrementally, resampled to the engine rate,
//! accumulated until a decode is worthwhile, and decoded in chunks that are
//! never resubmitted.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`StreamSession`] | One stream's buffer, flags, and engine decoder |
//! | [`StreamManager`] | A backend's id → session map and id counter |
//! | [`StreamDecoder`] | Engine-opaque incremental decoder state |
//! | [`StreamConfig`] | Per-stream language and readiness settings |
//!
//! Callers must serialize operations per stream id; the machine itself does
//! not lock (documented precondition of the backend contract).

mod manager;
mod session;

pub use manager::StreamManager;
pub use session::{
    DecodeOutput, SessionPhase, StreamConfig, StreamDecoder, StreamSession,
    DEFAULT_MIN_READY_SECS,
};
