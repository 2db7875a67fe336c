//! Stream bookkeeping for one backend instance.
//!
//! A [`StreamManager`] owns every live [`StreamSession`] of a backend, keyed
//! by stream id, and hands out ids from a monotonic counter scoped to the
//! manager. Streaming backends embed one and delegate the operation table's
//! stream calls to it; the manager converts incoming audio to the engine
//! rate before it reaches a session.

use std::collections::HashMap;

use log::debug;

use crate::audio::resample;
use crate::error::{ModalityError, ModalityResult};
use crate::streaming::session::{DecodeOutput, StreamConfig, StreamDecoder, StreamSession};

/// Owner of a backend's streaming sessions.
pub struct StreamManager {
    sessions: HashMap<String, StreamSession>,
    next_stream_id: u64,
    sample_rate: u32,
}

impl StreamManager {
    /// Create a manager whose sessions buffer at `sample_rate` (the engine's
    /// required rate).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sessions: HashMap::new(),
            next_stream_id: 1,
            sample_rate,
        }
    }

    /// The engine rate sessions buffer at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether `stream_id` names a live session.
    pub fn contains(&self, stream_id: &str) -> bool {
        self.sessions.contains_key(stream_id)
    }

    /// Open a new session around `decoder` and return its id.
    ///
    /// Ids are unique per manager: `stream-1`, `stream-2`, … from a
    /// monotonic counter that never reuses a value, so a destroyed id can
    /// never be confused with a live one.
    pub fn create(&mut self, config: StreamConfig, decoder: Box<dyn StreamDecoder>) -> String {
        let stream_id = format!("stream-{}", self.next_stream_id);
        self.next_stream_id += 1;

        let session = StreamSession::new(stream_id.clone(), config, self.sample_rate, decoder);
        debug!("created stream '{}' at {} Hz", stream_id, self.sample_rate);
        self.sessions.insert(stream_id.clone(), session);
        stream_id
    }

    /// Append audio to a session, resampling from `sample_rate` to the
    /// engine rate when they differ.
    pub fn feed(
        &mut self,
        stream_id: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> ModalityResult<()> {
        let target_rate = self.sample_rate;
        let session = self.session_mut(stream_id)?;

        if sample_rate == target_rate {
            session.feed(samples);
        } else {
            let converted = resample(samples, sample_rate, target_rate)?;
            session.feed(&converted);
        }
        Ok(())
    }

    /// Whether the session has buffered enough audio, or was finished.
    pub fn is_ready(&self, stream_id: &str) -> ModalityResult<bool> {
        Ok(self.session(stream_id)?.is_ready())
    }

    /// Decode the session's buffered audio; the buffer is cleared after.
    pub fn decode(&mut self, stream_id: &str) -> ModalityResult<DecodeOutput> {
        self.session_mut(stream_id)?.decode()
    }

    /// Engine endpoint heuristic for the session.
    pub fn is_endpoint(&self, stream_id: &str) -> ModalityResult<bool> {
        Ok(self.session(stream_id)?.is_endpoint())
    }

    /// Mark the session's input as finished.
    pub fn finish_input(&mut self, stream_id: &str) -> ModalityResult<()> {
        self.session_mut(stream_id)?.finish_input();
        Ok(())
    }

    /// Clear the session's buffer and flags, keeping the id.
    pub fn reset(&mut self, stream_id: &str) -> ModalityResult<()> {
        self.session_mut(stream_id)?.reset();
        Ok(())
    }

    /// Tear down a session. Destroying an unknown id is a no-op success.
    pub fn destroy(&mut self, stream_id: &str) -> ModalityResult<()> {
        if self.sessions.remove(stream_id).is_some() {
            debug!("destroyed stream '{}'", stream_id);
        }
        Ok(())
    }

    /// Tear down every session. Used by backend cleanup and drop.
    pub fn destroy_all(&mut self) {
        if !self.sessions.is_empty() {
            debug!("destroying {} outstanding stream(s)", self.sessions.len());
        }
        self.sessions.clear();
    }

    /// Ids of live sessions, sorted for stable output.
    pub fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn session(&self, stream_id: &str) -> ModalityResult<&StreamSession> {
        self.sessions
            .get(stream_id)
            .ok_or_else(|| ModalityError::not_found(format!("stream '{}'", stream_id)))
    }

    fn session_mut(&mut self, stream_id: &str) -> ModalityResult<&mut StreamSession> {
        self.sessions
            .get_mut(stream_id)
            .ok_or_else(|| ModalityError::not_found(format!("stream '{}'", stream_id)))
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("sessions", &self.sessions.len())
            .field("next_stream_id", &self.next_stream_id)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
