//! Contexts: the scope every other native object is created in.
//!
//! The engine keeps one last-error slot per context, overwritten by the next
//! failing call. Every context-scoped call made through [`Context::capi_call`]
//! holds the context's error-channel lock across the call and the read of
//! that slot, so a failure always reports its own message even when several
//! threads share the context.

use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};
use crate::handle::{CapiHandle, ContextHandle};
use crate::sys;
use crate::types::Filesystem;
use crate::util::{cstring, error_object_message};

#[derive(Debug)]
struct ContextInner {
    handle: ContextHandle,
    error_channel: Mutex<()>,
}

/// Shared engine context. Clones refer to the same native context.
///
/// Objects created from a context keep a clone of it, which they use to pass
/// the native context into calls and to fetch error messages. The context
/// does not track the objects created from it.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context with the default configuration.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        Self::build(Some(config))
    }

    fn build(config: Option<&Config>) -> Result<Self> {
        let config_ptr = config.map_or(ptr::null_mut(), Config::raw);
        let mut raw = ptr::null_mut();
        let mut error = ptr::null_mut();
        let status = unsafe { sys::tiledb_ctx_alloc_with_error(config_ptr, &mut raw, &mut error) };
        if status != sys::TILEDB_OK {
            // No context exists yet, so the allocator's own error object is
            // the only message available.
            return Err(Error::Allocation {
                kind: ContextHandle::KIND,
                message: unsafe { error_object_message(error) },
            });
        }
        let Some(handle) = (unsafe { ContextHandle::from_raw(raw) }) else {
            return Err(Error::Allocation {
                kind: ContextHandle::KIND,
                message: "engine returned a null context".into(),
            });
        };
        let context = Self {
            inner: Arc::new(ContextInner {
                handle,
                error_channel: Mutex::new(()),
            }),
        };
        context.set_tag("x-tiledb-api-language", "rust")?;
        context.set_tag("x-tiledb-api-language-version", env!("CARGO_PKG_VERSION"))?;
        Ok(context)
    }

    /// Run a context-scoped native call and translate its status.
    ///
    /// `operation` describes the call, including identifying arguments, and
    /// is only evaluated on failure. `call` must not call back into this
    /// context.
    pub(crate) fn capi_call<F>(&self, operation: impl FnOnce() -> String, call: F) -> Result<()>
    where
        F: FnOnce(*mut sys::tiledb_ctx_t) -> sys::capi_return_t,
    {
        let ctx = self.inner.handle.get();
        let _channel = self.inner.error_channel.lock();
        let status = call(ctx.as_ptr());
        if status == sys::TILEDB_OK {
            return Ok(());
        }
        let message = unsafe { Self::read_last_error(ctx.as_ptr()) }
            .unwrap_or_else(|| "no error message available".to_string());
        let operation = operation();
        tracing::debug!(%operation, status, %message, "native call failed");
        Err(Error::Operation {
            operation,
            code: ErrorCode::from_status(status),
            message,
        })
    }

    /// Read the last error if `failed` reports a failure recorded by the
    /// engine, holding the error channel across both steps.
    ///
    /// Completion callbacks use this to capture an asynchronous failure
    /// before a later call on the context can overwrite the slot.
    pub(crate) fn failure_message<F>(&self, failed: F) -> Option<String>
    where
        F: FnOnce(*mut sys::tiledb_ctx_t) -> bool,
    {
        let ctx = self.inner.handle.get();
        let _channel = self.inner.error_channel.lock();
        if !failed(ctx.as_ptr()) {
            return None;
        }
        Some(
            unsafe { Self::read_last_error(ctx.as_ptr()) }
                .unwrap_or_else(|| "no error message available".to_string()),
        )
    }

    /// Run a native call that allocates a new object of kind `H`.
    pub(crate) fn capi_alloc<H, F>(&self, call: F) -> Result<H>
    where
        H: CapiHandle,
        F: FnOnce(*mut sys::tiledb_ctx_t, *mut *mut H::Raw) -> sys::capi_return_t,
    {
        let mut raw = ptr::null_mut();
        self.capi_call(|| format!("allocate {}", H::KIND), |ctx| call(ctx, &mut raw))
            .map_err(|err| match err {
                Error::Operation { message, .. } => Error::Allocation {
                    kind: H::KIND,
                    message,
                },
                other => other,
            })?;
        unsafe { H::from_raw(raw) }.ok_or_else(|| Error::Allocation {
            kind: H::KIND,
            message: format!("engine returned a null {}", H::KIND),
        })
    }

    /// Run an accessor that hands out a new object of kind `H`.
    pub(crate) fn capi_handle<H, F>(&self, operation: impl FnOnce() -> String, call: F) -> Result<H>
    where
        H: CapiHandle,
        F: FnOnce(*mut sys::tiledb_ctx_t, *mut *mut H::Raw) -> sys::capi_return_t,
    {
        let mut raw = ptr::null_mut();
        self.capi_call(operation, |ctx| call(ctx, &mut raw))?;
        unsafe { H::from_raw(raw) }.ok_or_else(|| Error::InvalidState(format!("engine returned a null {}", H::KIND)))
    }

    unsafe fn read_last_error(ctx: *mut sys::tiledb_ctx_t) -> Option<String> {
        let mut error = ptr::null_mut();
        let status = unsafe { sys::tiledb_ctx_get_last_error(ctx, &mut error) };
        if status != sys::TILEDB_OK || error.is_null() {
            return None;
        }
        Some(unsafe { error_object_message(error) })
    }

    /// The message of the most recent failed call on this context.
    pub fn last_error(&self) -> Option<String> {
        let ctx = self.inner.handle.get();
        let _channel = self.inner.error_channel.lock();
        unsafe { Self::read_last_error(ctx.as_ptr()) }
    }

    /// A copy of the configuration the context was created with.
    pub fn config(&self) -> Result<Config> {
        let mut raw = ptr::null_mut();
        self.capi_call(
            || "get context config".into(),
            |ctx| unsafe { sys::tiledb_ctx_get_config(ctx, &mut raw) },
        )?;
        Config::from_raw(raw)
    }

    /// Attach a tag to requests the engine sends on this context's behalf.
    pub fn set_tag(&self, key: &str, value: &str) -> Result<()> {
        let c_key = cstring("key", key)?;
        let c_value = cstring("value", value)?;
        self.capi_call(
            || format!("set context tag '{key}'"),
            |ctx| unsafe { sys::tiledb_ctx_set_tag(ctx, c_key.as_ptr(), c_value.as_ptr()) },
        )
    }

    pub fn is_supported_fs(&self, fs: Filesystem) -> Result<bool> {
        let mut supported = 0;
        self.capi_call(
            || format!("check filesystem support for {fs:?}"),
            |ctx| unsafe { sys::tiledb_ctx_is_supported_fs(ctx, fs.to_raw(), &mut supported) },
        )?;
        Ok(supported != 0)
    }

    /// Release the native context. Objects created from it must not be used
    /// afterwards.
    pub fn free(&self) {
        self.inner.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::types::FilterType;
    use std::thread;

    #[test]
    fn test_context_carries_config() {
        let config = Config::new().unwrap();
        config.set("sm.memory_budget", "1234").unwrap();
        let ctx = Context::with_config(&config).unwrap();
        let copy = ctx.config().unwrap();
        assert_eq!(copy.get("sm.memory_budget").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_creation_failure_uses_allocator_error() {
        let config = Config::new().unwrap();
        config.set("sm.compute_concurrency_level", "0").unwrap();
        let err = Context::with_config(&config).unwrap_err();
        match err {
            Error::Allocation { kind, message } => {
                assert_eq!(kind, "context");
                assert!(message.contains("sm.compute_concurrency_level"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_memfs_support() {
        let ctx = Context::new().unwrap();
        assert!(ctx.is_supported_fs(Filesystem::Memfs).unwrap());
        assert!(!ctx.is_supported_fs(Filesystem::Hdfs).unwrap());
    }

    #[test]
    fn test_last_error_after_failure() {
        let ctx = Context::new().unwrap();
        assert!(ctx.last_error().is_none());
        let filter = Filter::new(&ctx, FilterType::Lz4).unwrap();
        let _ = filter.set_option(crate::types::FilterOption::ScaleFloatBytewidth, 8u64);
        assert!(ctx.last_error().unwrap().contains("not supported"));
    }

    #[test]
    fn test_shared_context_reports_own_errors() {
        let ctx = Context::new().unwrap();
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let ctx = ctx.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let config = ctx.config().unwrap();
                        let key = format!("worker.{i}");
                        config.set(&key, "1").unwrap();
                        let err = crate::array::Array::new(&ctx, &format!("missing-{i}"))
                            .and_then(|array| array.open(crate::types::QueryType::Read))
                            .unwrap_err();
                        let message = err.native_message().unwrap_or_default();
                        assert!(message.contains(&format!("missing-{i}")), "{err}");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }
    }

    #[test]
    fn test_free_is_idempotent() {
        let ctx = Context::new().unwrap();
        let clone = ctx.clone();
        ctx.free();
        clone.free();
    }
}
