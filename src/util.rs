//! Marshalling helpers shared by the wrappers.

use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr;

use crate::error::{Error, ErrorCode, Result};
use crate::handle::{CapiHandle, ErrorHandle, StringHandle};
use crate::sys::{self, c_char};

/// Convert a Rust string into a C string argument.
///
/// Returns an error if the string contains an interior NUL byte.
pub(crate) fn cstring(param_name: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| Error::InvalidArgument {
        name: param_name,
        reason: format!("contains a NUL byte: {value:?}"),
    })
}

/// Convert a path into a C string argument.
pub(crate) fn path_cstring(param_name: &'static str, path: &Path) -> Result<CString> {
    let Some(text) = path.to_str() else {
        return Err(Error::InvalidArgument {
            name: param_name,
            reason: format!("path is not valid UTF-8: {}", path.display()),
        });
    };
    cstring(param_name, text)
}

/// Copy a C string returned by the engine.
///
/// Returns an error if the pointer is null or the text is not UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn cstr_to_string(ptr: *const c_char, param_name: &'static str) -> Result<String> {
    match unsafe { cstr_to_option_string(ptr, param_name) }? {
        Some(value) => Ok(value),
        None => Err(Error::InvalidArgument {
            name: param_name,
            reason: "engine returned a null string".into(),
        }),
    }
}

/// Copy an optional C string returned by the engine. Null maps to `None`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn cstr_to_option_string(
    ptr: *const c_char,
    param_name: &'static str,
) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let cstr = unsafe { CStr::from_ptr(ptr) };
    match cstr.to_str() {
        Ok(s) => Ok(Some(s.to_string())),
        Err(_) => Err(Error::InvalidArgument {
            name: param_name,
            reason: "engine returned invalid UTF-8".into(),
        }),
    }
}

/// Take ownership of an error object and read its message.
///
/// # Safety
///
/// `raw` must be null or an error object nobody else will free.
pub(crate) unsafe fn error_object_message(raw: *mut sys::tiledb_error_t) -> String {
    let Some(error) = (unsafe { ErrorHandle::from_raw(raw) }) else {
        return "no error message available".to_string();
    };
    let mut message: *const c_char = ptr::null();
    let status = unsafe { sys::tiledb_error_message(error.get().as_ptr(), &mut message) };
    if status != sys::TILEDB_OK {
        return "failed to read error message".to_string();
    }
    unsafe { cstr_to_string(message, "error message") }
        .unwrap_or_else(|_| "error message is not valid UTF-8".to_string())
}

/// Run a context-less native call that reports failures through an
/// out-of-band error object.
pub(crate) fn out_of_band<F>(operation: impl FnOnce() -> String, call: F) -> Result<()>
where
    F: FnOnce(*mut *mut sys::tiledb_error_t) -> sys::capi_return_t,
{
    let mut error = ptr::null_mut();
    let status = call(&mut error);
    if status == sys::TILEDB_OK {
        return Ok(());
    }
    let message = unsafe { error_object_message(error) };
    let operation = operation();
    tracing::debug!(%operation, status, %message, "native call failed");
    Err(Error::Operation {
        operation,
        code: ErrorCode::from_status(status),
        message,
    })
}

/// Take ownership of an engine string object and copy its contents.
///
/// # Safety
///
/// `raw` must be a string object nobody else will free.
pub(crate) unsafe fn take_string(raw: *mut sys::tiledb_string_t) -> Result<String> {
    let Some(handle) = (unsafe { StringHandle::from_raw(raw) }) else {
        return Err(Error::InvalidArgument {
            name: "string",
            reason: "engine returned a null string".into(),
        });
    };
    let mut data: *const c_char = ptr::null();
    let mut len = 0usize;
    let status = unsafe { sys::tiledb_string_view(handle.get().as_ptr(), &mut data, &mut len) };
    if status != sys::TILEDB_OK {
        return Err(Error::InvalidState("failed to view engine string".into()));
    }
    let bytes = unsafe { crate::types::native_bytes(data.cast(), len as u64) };
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidArgument {
        name: "string",
        reason: "engine returned invalid UTF-8".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cstring_rejects_nul() {
        let err = cstring("key", "a\0b").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { name: "key", .. }));
    }

    #[test]
    fn test_null_string_is_none() {
        assert_eq!(unsafe { cstr_to_option_string(ptr::null(), "value") }.unwrap(), None);
        assert!(unsafe { cstr_to_string(ptr::null(), "value") }.is_err());
    }

    #[test]
    fn test_out_of_band_reads_engine_message() {
        let key = cstring("key", "sm.dedup_coords").unwrap();
        let value = cstring("value", "maybe").unwrap();
        let mut raw = ptr::null_mut();
        let mut err = ptr::null_mut();
        assert_eq!(unsafe { sys::tiledb_config_alloc(&mut raw, &mut err) }, sys::TILEDB_OK);
        let result = out_of_band(
            || "set config 'sm.dedup_coords'".into(),
            |err| unsafe { sys::tiledb_config_set(raw, key.as_ptr(), value.as_ptr(), err) },
        );
        unsafe { sys::tiledb_config_free(&mut raw) };
        let err = result.unwrap_err();
        assert!(err.to_string().contains("sm.dedup_coords"));
        assert!(err.native_message().unwrap().contains("maybe"));
    }
}
