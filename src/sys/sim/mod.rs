//! In-process engine exposing the TileDB C API.
//!
//! Every function here has the exact signature of its native counterpart so
//! the binding cannot tell the two apart. The behaviour is deliberately
//! small: enough state to drive every code path of the binding, including the
//! per-context last-error channel and asynchronous query completion on an
//! engine-owned thread.
//!
//! Handles are heap boxes handed out through out-parameters and released with
//! the matching `*_free` function, the same ownership contract as the native
//! library.

#![allow(clippy::missing_safety_doc)]

use super::*;
use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Dereference a context pointer or bail out with `TILEDB_ERR`.
macro_rules! sim_ctx {
    ($ctx:expr) => {
        match unsafe { $ctx.as_ref() } {
            Some(ctx) => ctx,
            None => return $crate::sys::TILEDB_ERR,
        }
    };
}

/// Dereference an object pointer, recording a context error when null.
macro_rules! sim_arg {
    ($ctx:expr, $ptr:expr, $what:literal) => {
        match unsafe { $ptr.as_ref() } {
            Some(value) => value,
            None => return $ctx.fail(concat!("Invalid ", $what, " object")),
        }
    };
}

/// Read a UTF-8 C string argument, recording a context error when invalid.
macro_rules! sim_str {
    ($ctx:expr, $ptr:expr, $what:literal) => {
        match unsafe { $crate::sys::sim::str_arg($ptr) } {
            Some(value) => value,
            None => return $ctx.fail(concat!("Invalid ", $what, " string")),
        }
    };
}

/// Write an out-parameter, recording a context error when null.
macro_rules! sim_out {
    ($ctx:expr, $ptr:expr, $value:expr) => {
        match unsafe { $ptr.as_mut() } {
            Some(slot) => *slot = $value,
            None => return $ctx.fail("Invalid output pointer"),
        }
    };
}

mod array;
mod buffer;
mod config;
mod context;
mod filter;
mod fragment_info;
mod group;
mod metadata;
mod query;
mod query_condition;
mod schema;
mod stats;
mod subarray;
mod vfs;

pub use array::*;
pub use buffer::*;
pub use config::*;
pub use context::*;
pub use filter::*;
pub use fragment_info::*;
pub use group::*;
pub use query::*;
pub use query_condition::*;
pub use schema::*;
pub use stats::*;
pub use subarray::*;
pub use vfs::*;

/// Engine version reported by `tiledb_version`.
pub(crate) const VERSION: (i32, i32, i32) = (2, 27, 0);

/// Error object handed out through `tiledb_error_t**` out-parameters.
pub struct tiledb_error_t {
    message: CString,
}

/// Engine-owned string handed out by accessors that return `tiledb_string_t*`.
pub struct tiledb_string_t {
    value: CString,
}

pub unsafe extern "C" fn tiledb_version(major: *mut i32, minor: *mut i32, rev: *mut i32) {
    unsafe {
        if let Some(slot) = major.as_mut() {
            *slot = VERSION.0;
        }
        if let Some(slot) = minor.as_mut() {
            *slot = VERSION.1;
        }
        if let Some(slot) = rev.as_mut() {
            *slot = VERSION.2;
        }
    }
}

pub unsafe extern "C" fn tiledb_error_message(
    err: *mut tiledb_error_t,
    errmsg: *mut *const c_char,
) -> capi_return_t {
    let Some(err) = (unsafe { err.as_ref() }) else {
        return TILEDB_ERR;
    };
    match unsafe { errmsg.as_mut() } {
        Some(slot) => {
            *slot = err.message.as_ptr();
            TILEDB_OK
        }
        None => TILEDB_ERR,
    }
}

pub unsafe extern "C" fn tiledb_error_free(err: *mut *mut tiledb_error_t) {
    unsafe { release(err, "error") }
}

pub unsafe extern "C" fn tiledb_string_view(
    s: *mut tiledb_string_t,
    data: *mut *const c_char,
    length: *mut usize,
) -> capi_return_t {
    let Some(s) = (unsafe { s.as_ref() }) else {
        return TILEDB_ERR;
    };
    unsafe {
        match (data.as_mut(), length.as_mut()) {
            (Some(data), Some(length)) => {
                *data = s.value.as_ptr();
                *length = s.value.as_bytes().len();
                TILEDB_OK
            }
            _ => TILEDB_ERR,
        }
    }
}

pub unsafe extern "C" fn tiledb_string_free(s: *mut *mut tiledb_string_t) -> capi_return_t {
    if s.is_null() {
        return TILEDB_ERR;
    }
    unsafe { release(s, "string") };
    TILEDB_OK
}

/// Build a C string, replacing interior NUL bytes so the conversion cannot fail.
pub(crate) fn c_string(value: &str) -> CString {
    CString::new(value.replace('\0', " ")).unwrap_or_default()
}

pub(crate) fn new_string(value: &str) -> *mut tiledb_string_t {
    boxed(tiledb_string_t { value: c_string(value) }, "string")
}

/// Store an error object in an out-of-band error slot and return `TILEDB_ERR`.
pub(crate) unsafe fn set_error(error: *mut *mut tiledb_error_t, message: &str) -> capi_return_t {
    if let Some(slot) = unsafe { error.as_mut() } {
        *slot = new_error(message);
    }
    TILEDB_ERR
}

pub(crate) fn new_error(message: &str) -> *mut tiledb_error_t {
    boxed(tiledb_error_t { message: c_string(message) }, "error")
}

pub(crate) unsafe fn clear_error(error: *mut *mut tiledb_error_t) {
    if let Some(slot) = unsafe { error.as_mut() } {
        *slot = std::ptr::null_mut();
    }
}

pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Move a value to the heap and hand out its address, counting the allocation.
pub(crate) fn boxed<T>(value: T, kind: &str) -> *mut T {
    stats::bump(&format!("Context.Sim.alloc.{kind}"), 1);
    Box::into_raw(Box::new(value))
}

thread_local! {
    static ENGINE_THREAD: Cell<bool> = const { Cell::new(false) };
}

static ENGINE_THREAD_RELEASES: AtomicUsize = AtomicUsize::new(0);

/// Mark the current thread as an engine worker.
pub(crate) fn enter_engine_thread() {
    ENGINE_THREAD.set(true);
}

/// Objects released from an engine worker so far. The native library would
/// join its own thread pool from such a call.
#[cfg(test)]
pub(crate) fn engine_thread_releases() -> usize {
    ENGINE_THREAD_RELEASES.load(Ordering::SeqCst)
}

/// Release a heap object handed out by [`boxed`] and null the caller's pointer.
pub(crate) unsafe fn release<T>(ptr: *mut *mut T, kind: &str) {
    let Some(slot) = (unsafe { ptr.as_mut() }) else {
        return;
    };
    if slot.is_null() {
        return;
    }
    // Error and string objects own no engine state.
    if ENGINE_THREAD.get() && !matches!(kind, "error" | "string") {
        ENGINE_THREAD_RELEASES.fetch_add(1, Ordering::SeqCst);
        tracing::error!(kind, "object released from an engine thread");
    }
    stats::bump(&format!("Context.Sim.free.{kind}"), 1);
    drop(unsafe { Box::from_raw(*slot) });
    *slot = std::ptr::null_mut();
}

/// Size in bytes of one value of a fixed-size datatype.
pub(crate) fn datatype_size(datatype: tiledb_datatype_t) -> Option<u64> {
    match datatype {
        TILEDB_INT8 | TILEDB_UINT8 | TILEDB_CHAR | TILEDB_STRING_ASCII | TILEDB_STRING_UTF8
        | TILEDB_BLOB | TILEDB_BOOL => Some(1),
        TILEDB_INT16 | TILEDB_UINT16 => Some(2),
        TILEDB_INT32 | TILEDB_UINT32 | TILEDB_FLOAT32 => Some(4),
        TILEDB_INT64 | TILEDB_UINT64 | TILEDB_FLOAT64 => Some(8),
        _ => None,
    }
}

pub(crate) fn is_integer(datatype: tiledb_datatype_t) -> bool {
    matches!(
        datatype,
        TILEDB_INT8 | TILEDB_UINT8 | TILEDB_INT16 | TILEDB_UINT16 | TILEDB_INT32 | TILEDB_UINT32 | TILEDB_INT64
            | TILEDB_UINT64
    )
}

/// Strip the `file://` scheme the native VFS accepts for local paths.
pub(crate) fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}
