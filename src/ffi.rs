//! FFI bindings for Dream Flux
//!
//! This module provides C-compatible functions for calling Dream Flux from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `dream_flux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::NormalizerConfig;
use crate::pipeline::{normalize_record_json, record_category, whoop_to_sleep_sessions, SleepProcessor};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Each element is already a JSON document
fn vec_to_json_array(vec: Vec<String>) -> String {
    format!("[{}]", vec.join(","))
}

// ============================================================================
// Stateless API
// ============================================================================

/// Normalize WHOOP sleep JSON and return a JSON array of canonical sessions.
///
/// Unscored records are left out of the array.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `dream_flux_free_string`.
/// - Returns NULL on error; call `dream_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_normalize_whoop(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    match whoop_to_sleep_sessions(json_str) {
        Ok(sessions) => string_to_cstr(&vec_to_json_array(sessions)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Normalize one tagged record (`{"kind": "dense" | "sparse", "record": {...}}`)
/// and return the canonical session JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `dream_flux_free_string`.
/// - Returns NULL on error, including unscored records.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_normalize_record(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    match normalize_record_json(json_str) {
        Ok(session) => string_to_cstr(&session),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Infer the dream category of one tagged record.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string (e.g. `"Career"`) that must be freed with
///   `dream_flux_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_infer_category(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    match record_category(json_str) {
        Ok(category) => string_to_cstr(category.as_str()),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a SleepProcessor
pub struct SleepProcessorHandle {
    processor: SleepProcessor,
}

unsafe fn processor_from_config(
    config_json: *const c_char,
    seed: Option<u64>,
) -> *mut SleepProcessorHandle {
    let config = if config_json.is_null() {
        NormalizerConfig::default()
    } else {
        let Some(json) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match NormalizerConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let processor = SleepProcessor::with_config_and_seed(config, seed);
    Box::into_raw(Box::new(SleepProcessorHandle { processor }))
}

/// Create a new SleepProcessor seeded from system entropy.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid null-terminated C string.
/// - Must be freed with `dream_flux_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_processor_new(
    config_json: *const c_char,
) -> *mut SleepProcessorHandle {
    clear_last_error();
    processor_from_config(config_json, None)
}

/// Create a new SleepProcessor with reproducible output.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid null-terminated C string.
/// - Must be freed with `dream_flux_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_processor_new_seeded(
    config_json: *const c_char,
    seed: u64,
) -> *mut SleepProcessorHandle {
    clear_last_error();
    processor_from_config(config_json, Some(seed))
}

/// Free a SleepProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `dream_flux_processor_new*`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_processor_free(processor: *mut SleepProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Normalize a WHOOP page with a stateful processor.
///
/// Returns the batch outcome as JSON: `{"sessions": [...], "skipped": [...], "next_token": ...}`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `dream_flux_processor_new*`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `dream_flux_free_string`.
/// - Returns NULL on error; call `dream_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_processor_process_whoop(
    processor: *mut SleepProcessorHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    match handle
        .processor
        .process_whoop(&json_str)
        .and_then(|outcome| outcome.to_json())
    {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Dream Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Dream Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Dream Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Dream Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn dream_flux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
