//! # modality-ffi
//!
//! C ABI boundary layer for modality-core.
//!
//! This crate exposes the capability-oriented runtime to any host language
//! that can consume a C library. Build it with:
//!
//! ```sh
//! cargo build -p modality-ffi --release
//! ```
//!
//! The output is `libmodality_ffi.{so,dylib}` / `modality_ffi.dll` plus the
//! generated header `include/modality.h`.
//!
//! ## Handles
//!
//! Backends live in a process-wide handle arena keyed by opaque `u64` ids.
//! `modality_destroy` frees the slot; every later call with that id returns
//! `MODALITY_INVALID_HANDLE` rather than touching freed memory. Ids are
//! never reused.
//!
//! ## Results and errors
//!
//! Every function returns an `int32_t` from the closed result-code
//! enumeration (`0` is success). The human-readable detail for the most
//! recent failure on the calling thread is available from
//! `modality_last_error()` until the next call on that thread.
//!
//! ## Memory ownership
//!
//! Strings returned through out-parameters are freed with
//! `modality_free_string`, sample buffers with `modality_free_samples`,
//! provider name lists with `modality_free_string_list`. The library never
//! frees memory it did not allocate and never retains references to memory
//! it has returned.

#![allow(clippy::missing_safety_doc)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use modality_core::backend::{ActiveOperations, CapabilityBackend};
use modality_core::builtin;
use modality_core::capability::Capability;
use modality_core::error::{ModalityError, ModalityResult};
use modality_core::payload::{CancellationToken, Payload, ProcessOptions};
use modality_core::provider::ServiceRequest;
use modality_core::registry::{self, ModuleInfo};
use modality_core::streaming::StreamConfig;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Capability values
// ============================================================================

/// Capability value for speech-to-text.
pub const MODALITY_CAPABILITY_STT: u32 = 0;
/// Capability value for text-to-speech.
pub const MODALITY_CAPABILITY_TTS: u32 = 1;
/// Capability value for voice activity detection.
pub const MODALITY_CAPABILITY_VAD: u32 = 2;
/// Capability value for language-model generation.
pub const MODALITY_CAPABILITY_LLM: u32 = 3;

fn capability_from_u32(value: u32) -> ModalityResult<Capability> {
    match value {
        MODALITY_CAPABILITY_STT => Ok(Capability::Stt),
        MODALITY_CAPABILITY_TTS => Ok(Capability::Tts),
        MODALITY_CAPABILITY_VAD => Ok(Capability::Vad),
        MODALITY_CAPABILITY_LLM => Ok(Capability::Llm),
        other => Err(ModalityError::invalid_input(format!(
            "unknown capability value {}",
            other
        ))),
    }
}

// ============================================================================
// Thread-local error storage
// ============================================================================

thread_local! {
    /// Detail string for the most recent failure on this thread.
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(message).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Record the failure and hand back its code.
fn fail(err: ModalityError) -> i32 {
    set_last_error(&err.to_string());
    err.code().as_i32()
}

fn complete(result: ModalityResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

// ============================================================================
// Handle arena
// ============================================================================

/// One live backend slot.
struct HandleEntry {
    backend: Mutex<Box<dyn CapabilityBackend>>,
    cancel: CancellationToken,
    active: ActiveOperations,
}

static HANDLES: OnceLock<Mutex<HashMap<u64, Arc<HandleEntry>>>> = OnceLock::new();
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn handles() -> &'static Mutex<HashMap<u64, Arc<HandleEntry>>> {
    HANDLES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn insert_backend(backend: Box<dyn CapabilityBackend>) -> u64 {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    let entry = Arc::new(HandleEntry {
        backend: Mutex::new(backend),
        cancel: CancellationToken::new(),
        active: ActiveOperations::new(),
    });
    handles()
        .lock()
        .expect("handle arena mutex poisoned")
        .insert(handle, entry);
    handle
}

fn entry_for(handle: u64) -> ModalityResult<Arc<HandleEntry>> {
    handles()
        .lock()
        .expect("handle arena mutex poisoned")
        .get(&handle)
        .cloned()
        .ok_or(ModalityError::InvalidHandle(handle))
}

/// Run `f` against the backend behind `handle`, containing panics from
/// provider code so they surface as result codes instead of unwinding
/// across the C boundary.
fn with_backend<T>(
    handle: u64,
    f: impl FnOnce(&mut dyn CapabilityBackend) -> ModalityResult<T>,
) -> ModalityResult<T> {
    let entry = entry_for(handle)?;
    let mut backend = entry
        .backend
        .lock()
        .map_err(|_| ModalityError::internal("backend mutex poisoned"))?;

    catch_unwind(AssertUnwindSafe(|| f(backend.as_mut())))
        .unwrap_or_else(|_| Err(ModalityError::internal("backend panicked")))
}

/// Like [`with_backend`], for batch operations: tracks the in-flight count
/// and arms a fresh cancellation token for this operation.
fn with_backend_batch<T>(
    handle: u64,
    f: impl FnOnce(&mut dyn CapabilityBackend, &ProcessOptions) -> ModalityResult<T>,
    language: Option<String>,
    voice: Option<String>,
) -> ModalityResult<T> {
    let entry = entry_for(handle)?;
    entry.cancel.clear();
    let options = ProcessOptions {
        language,
        voice,
        cancel: entry.cancel.clone(),
    };

    let _guard = entry.active.begin();
    let mut backend = entry
        .backend
        .lock()
        .map_err(|_| ModalityError::internal("backend mutex poisoned"))?;

    catch_unwind(AssertUnwindSafe(|| f(backend.as_mut(), &options)))
        .unwrap_or_else(|_| Err(ModalityError::internal("backend panicked")))
}

// ============================================================================
// Argument helpers
// ============================================================================

unsafe fn cstr_arg<'a>(ptr: *const c_char, name: &'static str) -> ModalityResult<&'a str> {
    if ptr.is_null() {
        return Err(ModalityError::NullArgument(name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| ModalityError::invalid_input(format!("{} is not valid UTF-8", name)))
}

unsafe fn opt_cstr_arg<'a>(
    ptr: *const c_char,
    name: &'static str,
) -> ModalityResult<Option<&'a str>> {
    if ptr.is_null() {
        return Ok(None);
    }
    cstr_arg(ptr, name).map(Some)
}

unsafe fn samples_arg<'a>(
    ptr: *const f32,
    count: usize,
    name: &'static str,
) -> ModalityResult<&'a [f32]> {
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(ModalityError::NullArgument(name));
    }
    Ok(std::slice::from_raw_parts(ptr, count))
}

fn out_ptr<'a, T>(ptr: *mut T, name: &'static str) -> ModalityResult<&'a mut T> {
    if ptr.is_null() {
        return Err(ModalityError::NullArgument(name));
    }
    // Safety: non-null and caller-owned per the function contracts below.
    Ok(unsafe { &mut *ptr })
}

/// Transfer a Rust string to the caller. Freed with `modality_free_string`.
fn transfer_string(text: String, out: *mut *mut c_char) -> ModalityResult<()> {
    let slot = out_ptr(out, "out pointer")?;
    let cstring = CString::new(text)
        .map_err(|_| ModalityError::internal("output text contained an interior nul byte"))?;
    *slot = cstring.into_raw();
    Ok(())
}

/// Transfer a sample buffer to the caller. Freed with
/// `modality_free_samples`.
fn transfer_samples(
    samples: Vec<f32>,
    out_samples: *mut *mut f32,
    out_count: *mut usize,
) -> ModalityResult<()> {
    let samples_slot = out_ptr(out_samples, "out_samples")?;
    let count_slot = out_ptr(out_count, "out_sample_count")?;

    let mut boxed = samples.into_boxed_slice();
    *count_slot = boxed.len();
    *samples_slot = boxed.as_mut_ptr();
    std::mem::forget(boxed);
    Ok(())
}

// ============================================================================
// Library lifecycle
// ============================================================================

/// Initialize the library: wires the logger (honoring `RUST_LOG`) and
/// registers the built-in providers. Safe to call more than once.
///
/// # Returns
///
/// `0` on success; a result code otherwise (see `modality_last_error()`).
#[no_mangle]
pub extern "C" fn modality_init() -> i32 {
    clear_last_error();
    let _ = env_logger::Builder::from_default_env().try_init();
    complete(builtin::register())
}

/// Get the library version string.
///
/// The returned pointer is valid for the lifetime of the library and must
/// NOT be freed by the caller.
#[no_mangle]
pub extern "C" fn modality_version() -> *const c_char {
    static VERSION_CSTRING: OnceLock<CString> = OnceLock::new();
    VERSION_CSTRING
        .get_or_init(|| CString::new(VERSION).expect("VERSION contains no null bytes"))
        .as_ptr()
}

/// Get the detail string for the most recent failure on this thread, or
/// null if the last call succeeded.
///
/// The pointer is valid until the next modality call on the same thread
/// and must NOT be freed by the caller.
#[no_mangle]
pub extern "C" fn modality_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

// ============================================================================
// Registration
// ============================================================================

/// Register a module record.
///
/// `capabilities` is a bitmask: bit `1 << MODALITY_CAPABILITY_*` marks a
/// contributed capability. Provider implementations themselves register
/// through the Rust API; this records the module's identity and
/// contribution.
///
/// # Returns
///
/// `0` on success, `MODALITY_ALREADY_REGISTERED` if the id is live.
#[no_mangle]
pub unsafe extern "C" fn modality_register_module(
    id: *const c_char,
    name: *const c_char,
    version: *const c_char,
    capabilities: u32,
) -> i32 {
    clear_last_error();
    complete((|| {
        let id = cstr_arg(id, "id")?;
        let name = cstr_arg(name, "name")?;
        let version = cstr_arg(version, "version")?;
        registry::register_module(ModuleInfo::new(
            id,
            name,
            version,
            Capability::set_from_bits(capabilities),
        ))
    })())
}

/// Unregister a module record. Does not unregister its providers.
#[no_mangle]
pub unsafe extern "C" fn modality_unregister_module(id: *const c_char) -> i32 {
    clear_last_error();
    complete((|| {
        let id = cstr_arg(id, "id")?;
        registry::unregister_module(id)
    })())
}

/// Unregister a provider by name and capability.
#[no_mangle]
pub unsafe extern "C" fn modality_unregister_provider(
    name: *const c_char,
    capability: u32,
) -> i32 {
    clear_last_error();
    complete((|| {
        let name = cstr_arg(name, "name")?;
        let capability = capability_from_u32(capability)?;
        registry::unregister_provider(name, capability)
    })())
}

/// List provider names for a capability, in resolution order.
///
/// On success `*out_names` points to an array of `*out_count` strings.
/// Free the array (and every string in it) with
/// `modality_free_string_list`. An empty list is returned as a null array
/// with count 0.
#[no_mangle]
pub unsafe extern "C" fn modality_list_providers(
    capability: u32,
    out_names: *mut *mut *mut c_char,
    out_count: *mut usize,
) -> i32 {
    clear_last_error();
    complete((|| {
        let capability = capability_from_u32(capability)?;
        let names_slot = out_ptr(out_names, "out_names")?;
        let count_slot = out_ptr(out_count, "out_count")?;

        let names = registry::list_providers(capability);
        if names.is_empty() {
            *names_slot = std::ptr::null_mut();
            *count_slot = 0;
            return Ok(());
        }

        let mut pointers: Vec<*mut c_char> = Vec::with_capacity(names.len());
        for name in names {
            let cstring = CString::new(name)
                .map_err(|_| ModalityError::internal("provider name contained a nul byte"))?;
            pointers.push(cstring.into_raw());
        }

        let mut boxed = pointers.into_boxed_slice();
        *count_slot = boxed.len();
        *names_slot = boxed.as_mut_ptr();
        std::mem::forget(boxed);
        Ok(())
    })())
}

// ============================================================================
// Handle lifecycle
// ============================================================================

/// Resolve a capability request and create a backend for it.
///
/// `identifier` may be null or empty to request the capability's default
/// provider. On success `*out_handle` receives an opaque handle that must
/// eventually be released with `modality_destroy`.
#[no_mangle]
pub unsafe extern "C" fn modality_create(
    identifier: *const c_char,
    capability: u32,
    out_handle: *mut u64,
) -> i32 {
    clear_last_error();
    complete((|| {
        let identifier = opt_cstr_arg(identifier, "identifier")?.unwrap_or("");
        let capability = capability_from_u32(capability)?;
        let handle_slot = out_ptr(out_handle, "out_handle")?;

        let request = ServiceRequest::new(identifier, capability);
        let backend = catch_unwind(AssertUnwindSafe(|| registry::create_backend(&request)))
            .unwrap_or_else(|_| {
                Err(ModalityError::BackendInit(
                    "provider panicked while creating backend".to_string(),
                ))
            })?;

        *handle_slot = insert_backend(backend);
        Ok(())
    })())
}

/// Load a model into the backend.
#[no_mangle]
pub unsafe extern "C" fn modality_initialize(handle: u64, model_path: *const c_char) -> i32 {
    clear_last_error();
    complete((|| {
        let model_path = cstr_arg(model_path, "model_path")?;
        with_backend(handle, |backend| backend.initialize(model_path))
    })())
}

/// Backend state snapshot returned by `modality_get_info`.
#[repr(C)]
pub struct ModalityBackendInfo {
    /// Whether a model is loaded.
    pub is_ready: bool,
    /// Whether the backend implements the streaming operations.
    pub supports_streaming: bool,
    /// Loaded model path, or null. Free with `modality_free_string`.
    pub current_model: *mut c_char,
}

/// Query a backend's state.
#[no_mangle]
pub unsafe extern "C" fn modality_get_info(handle: u64, out_info: *mut ModalityBackendInfo) -> i32 {
    clear_last_error();
    complete((|| {
        let info_slot = out_ptr(out_info, "out_info")?;
        let info = with_backend(handle, |backend| Ok(backend.info()))?;

        let current_model = match info.current_model {
            Some(model) => CString::new(model)
                .map_err(|_| ModalityError::internal("model path contained a nul byte"))?
                .into_raw(),
            None => std::ptr::null_mut(),
        };

        *info_slot = ModalityBackendInfo {
            is_ready: info.is_ready,
            supports_streaming: info.supports_streaming,
            current_model,
        };
        Ok(())
    })())
}

/// Release the backend's engine resources, keeping the handle valid for a
/// later `modality_initialize`. Outstanding streams are destroyed.
///
/// If a batch operation is still in flight on another thread the cleanup
/// proceeds after it completes; a warning is logged rather than failing.
#[no_mangle]
pub extern "C" fn modality_cleanup(handle: u64) -> i32 {
    clear_last_error();
    complete((|| {
        let entry = entry_for(handle)?;
        let in_flight = entry.active.count();
        if in_flight > 0 {
            log::warn!(
                "cleanup requested on handle {} with {} operation(s) in flight",
                handle,
                in_flight
            );
        }
        with_backend(handle, |backend| backend.cleanup())
    })())
}

/// Destroy the backend and free its handle slot. Every later call with
/// this handle returns `MODALITY_INVALID_HANDLE`.
#[no_mangle]
pub extern "C" fn modality_destroy(handle: u64) -> i32 {
    clear_last_error();
    complete((|| {
        let removed = handles()
            .lock()
            .expect("handle arena mutex poisoned")
            .remove(&handle);
        match removed {
            Some(_) => Ok(()),
            None => Err(ModalityError::InvalidHandle(handle)),
        }
    })())
}

/// Request cooperative cancellation of the batch operation currently in
/// flight on this handle. The engine observes the flag at its own
/// granularity; the blocked call still returns at its own pace.
#[no_mangle]
pub extern "C" fn modality_cancel(handle: u64) -> i32 {
    clear_last_error();
    complete((|| {
        let entry = entry_for(handle)?;
        entry.cancel.cancel();
        Ok(())
    })())
}

// ============================================================================
// Batch operations
// ============================================================================

/// Transcribe audio in one shot (STT backends).
///
/// On success `*out_text` receives the transcription; free it with
/// `modality_free_string`.
#[no_mangle]
pub unsafe extern "C" fn modality_transcribe(
    handle: u64,
    samples: *const f32,
    sample_count: usize,
    sample_rate: u32,
    language: *const c_char,
    out_text: *mut *mut c_char,
) -> i32 {
    clear_last_error();
    complete((|| {
        let samples = samples_arg(samples, sample_count, "samples")?;
        let language = opt_cstr_arg(language, "language")?.map(str::to_string);
        if out_text.is_null() {
            return Err(ModalityError::NullArgument("out_text"));
        }

        let output = with_backend_batch(
            handle,
            |backend, options| {
                backend.process(Payload::audio(samples.to_vec(), sample_rate), options)
            },
            language,
            None,
        )?;

        match output {
            Payload::Text(text) => transfer_string(text, out_text),
            other => Err(ModalityError::internal(format!(
                "backend returned {} payload for transcription",
                other.kind_name()
            ))),
        }
    })())
}

/// Synthesize speech in one shot (TTS backends).
///
/// On success `*out_samples` receives `*out_sample_count` PCM samples at
/// `*out_sample_rate` Hz; free the buffer with `modality_free_samples`.
#[no_mangle]
pub unsafe extern "C" fn modality_synthesize(
    handle: u64,
    text: *const c_char,
    voice: *const c_char,
    out_samples: *mut *mut f32,
    out_sample_count: *mut usize,
    out_sample_rate: *mut u32,
) -> i32 {
    clear_last_error();
    complete((|| {
        let text = cstr_arg(text, "text")?;
        let voice = opt_cstr_arg(voice, "voice")?.map(str::to_string);
        let rate_slot = out_ptr(out_sample_rate, "out_sample_rate")?;

        let output = with_backend_batch(
            handle,
            |backend, options| backend.process(Payload::text(text), options),
            None,
            voice,
        )?;

        match output {
            Payload::Audio(frame) => {
                *rate_slot = frame.sample_rate;
                transfer_samples(frame.samples, out_samples, out_sample_count)
            }
            other => Err(ModalityError::internal(format!(
                "backend returned {} payload for synthesis",
                other.kind_name()
            ))),
        }
    })())
}

/// Detect speech in an audio buffer (VAD backends).
#[no_mangle]
pub unsafe extern "C" fn modality_detect(
    handle: u64,
    samples: *const f32,
    sample_count: usize,
    sample_rate: u32,
    out_is_speech: *mut bool,
) -> i32 {
    clear_last_error();
    complete((|| {
        let samples = samples_arg(samples, sample_count, "samples")?;
        let speech_slot = out_ptr(out_is_speech, "out_is_speech")?;

        let output = with_backend_batch(
            handle,
            |backend, options| {
                backend.process(Payload::audio(samples.to_vec(), sample_rate), options)
            },
            None,
            None,
        )?;

        match output {
            Payload::Flag(detected) => {
                *speech_slot = detected;
                Ok(())
            }
            other => Err(ModalityError::internal(format!(
                "backend returned {} payload for detection",
                other.kind_name()
            ))),
        }
    })())
}

/// Generate text from a prompt (LLM backends).
///
/// On success `*out_text` receives the generation; free it with
/// `modality_free_string`.
#[no_mangle]
pub unsafe extern "C" fn modality_generate(
    handle: u64,
    prompt: *const c_char,
    out_text: *mut *mut c_char,
) -> i32 {
    clear_last_error();
    complete((|| {
        let prompt = cstr_arg(prompt, "prompt")?;
        if out_text.is_null() {
            return Err(ModalityError::NullArgument("out_text"));
        }

        let output = with_backend_batch(
            handle,
            |backend, options| backend.process(Payload::text(prompt), options),
            None,
            None,
        )?;

        match output {
            Payload::Text(text) => transfer_string(text, out_text),
            other => Err(ModalityError::internal(format!(
                "backend returned {} payload for generation",
                other.kind_name()
            ))),
        }
    })())
}

// ============================================================================
// Streaming operations
// ============================================================================

/// Open a streaming session on the backend.
///
/// `config_json` is an optional JSON object (`{"language": "en",
/// "min_ready_secs": 0.5}`); pass null for defaults. On success
/// `*out_stream_id` receives the session id; free it with
/// `modality_free_string`.
#[no_mangle]
pub unsafe extern "C" fn modality_create_stream(
    handle: u64,
    config_json: *const c_char,
    out_stream_id: *mut *mut c_char,
) -> i32 {
    clear_last_error();
    complete((|| {
        let config = match opt_cstr_arg(config_json, "config_json")? {
            Some(json) => serde_json::from_str::<StreamConfig>(json).map_err(|e| {
                ModalityError::invalid_input(format!("malformed stream config: {}", e))
            })?,
            None => StreamConfig::default(),
        };
        if out_stream_id.is_null() {
            return Err(ModalityError::NullArgument("out_stream_id"));
        }

        let stream_id = with_backend(handle, |backend| backend.create_stream(config))?;
        transfer_string(stream_id, out_stream_id)
    })())
}

/// Append audio to a stream. Samples are resampled to the engine rate when
/// `sample_rate` differs from it.
#[no_mangle]
pub unsafe extern "C" fn modality_feed_audio(
    handle: u64,
    stream_id: *const c_char,
    samples: *const f32,
    sample_count: usize,
    sample_rate: u32,
) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        let samples = samples_arg(samples, sample_count, "samples")?;
        with_backend(handle, |backend| {
            backend.feed_audio(stream_id, samples, sample_rate)
        })
    })())
}

/// Whether the stream has buffered enough audio for a worthwhile decode
/// (or its input was finished).
#[no_mangle]
pub unsafe extern "C" fn modality_is_stream_ready(
    handle: u64,
    stream_id: *const c_char,
    out_ready: *mut bool,
) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        let ready_slot = out_ptr(out_ready, "out_ready")?;
        *ready_slot = with_backend(handle, |backend| backend.is_stream_ready(stream_id))?;
        Ok(())
    })())
}

/// Incrementally decode the stream's buffered audio. The buffer is cleared;
/// previously decoded samples are never resubmitted.
///
/// On success `*out_text` receives the recognized text (free with
/// `modality_free_string`) and `*out_is_final` is true when the decode
/// covered the final audio of the stream.
#[no_mangle]
pub unsafe extern "C" fn modality_decode_stream(
    handle: u64,
    stream_id: *const c_char,
    out_text: *mut *mut c_char,
    out_is_final: *mut bool,
) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        let final_slot = out_ptr(out_is_final, "out_is_final")?;
        if out_text.is_null() {
            return Err(ModalityError::NullArgument("out_text"));
        }

        let output = with_backend(handle, |backend| backend.decode_stream(stream_id))?;
        *final_slot = output.is_final;
        match output.payload {
            Payload::Text(text) => transfer_string(text, out_text),
            other => Err(ModalityError::unsupported(format!(
                "stream produced a {} payload, which the C surface does not carry",
                other.kind_name()
            ))),
        }
    })())
}

/// Engine heuristic for "speech has ended"; false when the engine has none.
#[no_mangle]
pub unsafe extern "C" fn modality_is_endpoint(
    handle: u64,
    stream_id: *const c_char,
    out_endpoint: *mut bool,
) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        let endpoint_slot = out_ptr(out_endpoint, "out_endpoint")?;
        *endpoint_slot = with_backend(handle, |backend| backend.is_endpoint(stream_id))?;
        Ok(())
    })())
}

/// Mark that no more audio will be fed to the stream. Does not decode.
#[no_mangle]
pub unsafe extern "C" fn modality_finish_input(handle: u64, stream_id: *const c_char) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        with_backend(handle, |backend| backend.finish_stream_input(stream_id))
    })())
}

/// Clear the stream's buffer and finished flag, keeping its id.
#[no_mangle]
pub unsafe extern "C" fn modality_reset_stream(handle: u64, stream_id: *const c_char) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        with_backend(handle, |backend| backend.reset_stream(stream_id))
    })())
}

/// Tear down a stream. Destroying an unknown id is a no-op success.
#[no_mangle]
pub unsafe extern "C" fn modality_destroy_stream(handle: u64, stream_id: *const c_char) -> i32 {
    clear_last_error();
    complete((|| {
        let stream_id = cstr_arg(stream_id, "stream_id")?;
        with_backend(handle, |backend| backend.destroy_stream(stream_id))
    })())
}

// ============================================================================
// Memory release
// ============================================================================

/// Free a string returned by this library. Passing null is a no-op.
///
/// # Safety
///
/// The pointer must have been returned by a modality function that
/// documents `modality_free_string`, and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn modality_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Free a sample buffer returned by `modality_synthesize`. Passing null is
/// a no-op.
///
/// # Safety
///
/// `samples`/`count` must be exactly the pair a modality function returned,
/// and the buffer must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn modality_free_samples(samples: *mut f32, count: usize) {
    if !samples.is_null() {
        let _ = Vec::from_raw_parts(samples, count, count);
    }
}

/// Free a provider name list returned by `modality_list_providers`.
/// Passing a null array is a no-op.
///
/// # Safety
///
/// `names`/`count` must be exactly the pair `modality_list_providers`
/// returned, and neither the array nor its strings may be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn modality_free_string_list(names: *mut *mut c_char, count: usize) {
    if names.is_null() {
        return;
    }
    let list = Vec::from_raw_parts(names, count, count);
    for name in list {
        modality_free_string(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modality_core::testing::{MockSttProvider, MockTtsProvider};
    use std::ptr;
    use std::sync::Arc;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let text = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        modality_free_string(ptr);
        text
    }

    #[test]
    fn test_version_and_init() {
        assert!(!modality_version().is_null());
        assert_eq!(modality_init(), 0);
        // Idempotent.
        assert_eq!(modality_init(), 0);
    }

    #[test]
    fn test_module_registration_codes() {
        unsafe {
            let id = c("ffi-test-module");
            let name = c("FFI test module");
            let version = c("1.0.0");
            let caps = 1 << MODALITY_CAPABILITY_STT;

            assert_eq!(
                modality_register_module(id.as_ptr(), name.as_ptr(), version.as_ptr(), caps),
                0
            );
            let code =
                modality_register_module(id.as_ptr(), name.as_ptr(), version.as_ptr(), caps);
            assert_eq!(code, ModalityError::already_registered("x").code().as_i32());
            assert!(!modality_last_error().is_null());

            assert_eq!(modality_unregister_module(id.as_ptr()), 0);
        }
    }

    #[test]
    fn test_null_arguments_are_reported() {
        unsafe {
            let code = modality_register_module(
                ptr::null(),
                ptr::null(),
                ptr::null(),
                0,
            );
            assert_eq!(code, ModalityError::NullArgument("id").code().as_i32());
        }
    }

    #[test]
    fn test_create_without_provider() {
        unsafe {
            let identifier = c("no-such-model.gguf");
            let mut handle = 0u64;
            let code =
                modality_create(identifier.as_ptr(), MODALITY_CAPABILITY_LLM, &mut handle);
            assert_eq!(
                code,
                ModalityError::NoProviderAvailable {
                    capability: Capability::Llm,
                    identifier: String::new(),
                }
                .code()
                .as_i32()
            );
        }
    }

    #[test]
    fn test_unknown_capability_value() {
        unsafe {
            let mut handle = 0u64;
            let code = modality_create(ptr::null(), 99, &mut handle);
            assert_eq!(code, ModalityError::invalid_input("x").code().as_i32());
        }
    }

    #[test]
    fn test_invalid_handle_paths() {
        unsafe {
            let invalid = ModalityError::InvalidHandle(0).code().as_i32();
            let path = c("model.bin");
            assert_eq!(modality_initialize(0xdead, path.as_ptr()), invalid);
            assert_eq!(modality_cleanup(0xdead), invalid);
            assert_eq!(modality_cancel(0xdead), invalid);
            assert_eq!(modality_destroy(0xdead), invalid);
        }
    }

    #[test]
    fn test_stt_stream_lifecycle_over_ffi() {
        registry::register_provider(Arc::new(MockSttProvider::new("ffi-stt-stream", 100)))
            .unwrap();

        unsafe {
            let identifier = c("ffi-model.bin");
            let mut handle = 0u64;
            assert_eq!(
                modality_create(identifier.as_ptr(), MODALITY_CAPABILITY_STT, &mut handle),
                0
            );

            let path = c("ffi-model.bin");
            assert_eq!(modality_initialize(handle, path.as_ptr()), 0);

            let mut info = ModalityBackendInfo {
                is_ready: false,
                supports_streaming: false,
                current_model: ptr::null_mut(),
            };
            assert_eq!(modality_get_info(handle, &mut info), 0);
            assert!(info.is_ready);
            assert!(info.supports_streaming);
            assert_eq!(take_string(info.current_model), "ffi-model.bin");

            // Stream with a lowered readiness threshold via JSON config.
            let config = c(r#"{"min_ready_secs": 0.5}"#);
            let mut stream_id_ptr: *mut c_char = ptr::null_mut();
            assert_eq!(
                modality_create_stream(handle, config.as_ptr(), &mut stream_id_ptr),
                0
            );
            let stream_id = take_string(stream_id_ptr);
            let stream_id_c = c(&stream_id);

            let samples = vec![0.1f32; 8000];
            assert_eq!(
                modality_feed_audio(
                    handle,
                    stream_id_c.as_ptr(),
                    samples.as_ptr(),
                    samples.len(),
                    16000
                ),
                0
            );

            let mut ready = false;
            assert_eq!(
                modality_is_stream_ready(handle, stream_id_c.as_ptr(), &mut ready),
                0
            );
            assert!(ready);

            let mut text_ptr: *mut c_char = ptr::null_mut();
            let mut is_final = true;
            assert_eq!(
                modality_decode_stream(handle, stream_id_c.as_ptr(), &mut text_ptr, &mut is_final),
                0
            );
            assert_eq!(take_string(text_ptr), "segment-1");
            assert!(!is_final);

            assert_eq!(modality_finish_input(handle, stream_id_c.as_ptr()), 0);
            assert_eq!(
                modality_decode_stream(handle, stream_id_c.as_ptr(), &mut text_ptr, &mut is_final),
                0
            );
            take_string(text_ptr);
            assert!(is_final);

            // Idempotent destroy, then NotFound on the dead id.
            assert_eq!(modality_destroy_stream(handle, stream_id_c.as_ptr()), 0);
            assert_eq!(modality_destroy_stream(handle, stream_id_c.as_ptr()), 0);
            let code = modality_finish_input(handle, stream_id_c.as_ptr());
            assert_eq!(code, ModalityError::not_found("x").code().as_i32());

            // Destroyed handles answer InvalidHandle forever after.
            assert_eq!(modality_destroy(handle), 0);
            let invalid = ModalityError::InvalidHandle(0).code().as_i32();
            assert_eq!(modality_destroy(handle), invalid);
            assert_eq!(modality_cleanup(handle), invalid);
        }

        registry::unregister_provider("ffi-stt-stream", Capability::Stt).unwrap();
    }

    #[test]
    fn test_transcribe_over_ffi() {
        registry::register_provider(Arc::new(MockSttProvider::new("ffi-stt-batch", 90)))
            .unwrap();

        unsafe {
            let identifier = c("batch-model.bin");
            let mut handle = 0u64;
            assert_eq!(
                modality_create(identifier.as_ptr(), MODALITY_CAPABILITY_STT, &mut handle),
                0
            );
            let path = c("batch-model.bin");
            assert_eq!(modality_initialize(handle, path.as_ptr()), 0);

            let samples = vec![0.0f32; 16000];
            let mut text_ptr: *mut c_char = ptr::null_mut();
            assert_eq!(
                modality_transcribe(
                    handle,
                    samples.as_ptr(),
                    samples.len(),
                    16000,
                    ptr::null(),
                    &mut text_ptr
                ),
                0
            );
            assert_eq!(take_string(text_ptr), "transcribed 16000 samples");

            assert_eq!(modality_destroy(handle), 0);
        }

        registry::unregister_provider("ffi-stt-batch", Capability::Stt).unwrap();
    }

    #[test]
    fn test_synthesize_and_free_samples() {
        registry::register_provider(Arc::new(MockTtsProvider::new("ffi-tts", 90))).unwrap();

        unsafe {
            let mut handle = 0u64;
            assert_eq!(
                modality_create(ptr::null(), MODALITY_CAPABILITY_TTS, &mut handle),
                0
            );
            let voice = c("voice.bin");
            assert_eq!(modality_initialize(handle, voice.as_ptr()), 0);

            let text = c("hey");
            let mut samples_ptr: *mut f32 = ptr::null_mut();
            let mut count = 0usize;
            let mut rate = 0u32;
            assert_eq!(
                modality_synthesize(
                    handle,
                    text.as_ptr(),
                    ptr::null(),
                    &mut samples_ptr,
                    &mut count,
                    &mut rate
                ),
                0
            );
            assert_eq!(count, 3 * 160);
            assert_eq!(rate, 16000);
            assert!(!samples_ptr.is_null());
            modality_free_samples(samples_ptr, count);

            assert_eq!(modality_destroy(handle), 0);
        }

        registry::unregister_provider("ffi-tts", Capability::Tts).unwrap();
    }

    #[test]
    fn test_detect_via_builtin_vad() {
        assert_eq!(modality_init(), 0);

        unsafe {
            let mut handle = 0u64;
            assert_eq!(
                modality_create(ptr::null(), MODALITY_CAPABILITY_VAD, &mut handle),
                0
            );
            let path = c("");
            assert_eq!(modality_initialize(handle, path.as_ptr()), 0);

            let silence = vec![0.0f32; 16000];
            let mut is_speech = true;
            assert_eq!(
                modality_detect(handle, silence.as_ptr(), silence.len(), 16000, &mut is_speech),
                0
            );
            assert!(!is_speech);

            let tone: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
            assert_eq!(
                modality_detect(handle, tone.as_ptr(), tone.len(), 16000, &mut is_speech),
                0
            );
            assert!(is_speech);

            assert_eq!(modality_destroy(handle), 0);
        }
    }

    #[test]
    fn test_list_providers_round_trip() {
        registry::register_provider(Arc::new(MockSttProvider::new("ffi-list-a", 100)))
            .unwrap();
        registry::register_provider(Arc::new(MockSttProvider::new("ffi-list-b", 50)))
            .unwrap();

        unsafe {
            let mut names: *mut *mut c_char = ptr::null_mut();
            let mut count = 0usize;
            assert_eq!(
                modality_list_providers(MODALITY_CAPABILITY_STT, &mut names, &mut count),
                0
            );
            assert!(count >= 2);
            assert!(!names.is_null());

            let list = std::slice::from_raw_parts(names, count);
            let rendered: Vec<String> = list
                .iter()
                .map(|&p| CStr::from_ptr(p).to_str().unwrap().to_string())
                .collect();
            let pos_a = rendered.iter().position(|n| n == "ffi-list-a").unwrap();
            let pos_b = rendered.iter().position(|n| n == "ffi-list-b").unwrap();
            assert!(pos_a < pos_b);

            modality_free_string_list(names, count);
        }

        registry::unregister_provider("ffi-list-a", Capability::Stt).unwrap();
        registry::unregister_provider("ffi-list-b", Capability::Stt).unwrap();
    }

    #[test]
    fn test_malformed_stream_config() {
        registry::register_provider(Arc::new(MockSttProvider::new("ffi-badcfg", 80))).unwrap();

        unsafe {
            let identifier = c("model.bin");
            let mut handle = 0u64;
            assert_eq!(
                modality_create(identifier.as_ptr(), MODALITY_CAPABILITY_STT, &mut handle),
                0
            );
            let path = c("model.bin");
            assert_eq!(modality_initialize(handle, path.as_ptr()), 0);

            let config = c("{not json");
            let mut stream_id: *mut c_char = ptr::null_mut();
            let code = modality_create_stream(handle, config.as_ptr(), &mut stream_id);
            assert_eq!(code, ModalityError::invalid_input("x").code().as_i32());

            assert_eq!(modality_destroy(handle), 0);
        }

        registry::unregister_provider("ffi-badcfg", Capability::Stt).unwrap();
    }
}
