//! Contexts: engine configuration plus the per-context last-error slot.

use super::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

pub struct tiledb_ctx_t {
    config: tiledb_config_t,
    last_error: Mutex<Option<String>>,
    tags: Mutex<BTreeMap<String, String>>,
}

impl tiledb_ctx_t {
    /// Record `message` as this context's last error and return `TILEDB_ERR`.
    pub(crate) fn fail(&self, message: impl Into<String>) -> capi_return_t {
        *self.last_error.lock() = Some(message.into());
        TILEDB_ERR
    }

    /// Artificial latency applied to query submission.
    pub(crate) fn submit_delay(&self) -> Duration {
        self.config
            .lookup("sim.submit_delay_ms")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or_default()
    }

    pub(crate) fn config(&self) -> &tiledb_config_t {
        &self.config
    }
}

pub unsafe extern "C" fn tiledb_ctx_alloc_with_error(
    config: *mut tiledb_config_t,
    ctx: *mut *mut tiledb_ctx_t,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(slot) = (unsafe { ctx.as_mut() }) else {
        return unsafe { set_error(error, "Cannot create context; invalid output pointer") };
    };
    let config = match unsafe { config.as_ref() } {
        Some(config) => tiledb_config_t::from_params(config.snapshot()),
        None => tiledb_config_t::with_defaults(),
    };
    if config.lookup("sm.compute_concurrency_level").as_deref() == Some("0") {
        *slot = std::ptr::null_mut();
        return unsafe {
            set_error(
                error,
                "Context: Cannot create context; sm.compute_concurrency_level must be positive",
            )
        };
    }
    *slot = boxed(
        tiledb_ctx_t {
            config,
            last_error: Mutex::new(None),
            tags: Mutex::new(BTreeMap::new()),
        },
        "ctx",
    );
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_ctx_free(ctx: *mut *mut tiledb_ctx_t) {
    unsafe { release(ctx, "ctx") }
}

pub unsafe extern "C" fn tiledb_ctx_get_last_error(
    ctx: *mut tiledb_ctx_t,
    err: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let Some(slot) = (unsafe { err.as_mut() }) else {
        return TILEDB_ERR;
    };
    *slot = match ctx.last_error.lock().as_deref() {
        Some(message) => new_error(message),
        None => std::ptr::null_mut(),
    };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_ctx_get_config(
    ctx: *mut tiledb_ctx_t,
    config: *mut *mut tiledb_config_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let copy = tiledb_config_t::from_params(ctx.config.snapshot());
    sim_out!(ctx, config, boxed(copy, "config"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_ctx_set_tag(
    ctx: *mut tiledb_ctx_t,
    key: *const c_char,
    value: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let key = sim_str!(ctx, key, "tag key");
    let value = sim_str!(ctx, value, "tag value");
    ctx.tags.lock().insert(key.to_string(), value.to_string());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_ctx_is_supported_fs(
    ctx: *mut tiledb_ctx_t,
    fs: tiledb_filesystem_t,
    is_supported: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_out!(ctx, is_supported, (fs == TILEDB_MEMFS) as i32);
    TILEDB_OK
}
