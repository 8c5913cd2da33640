//! Engine statistics: named counters gathered while enabled.

use super::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);
static COUNTERS: LazyLock<Mutex<BTreeMap<String, u64>>> = LazyLock::new(Default::default);

/// Add `by` to a counter if statistics gathering is enabled.
pub(crate) fn bump(name: &str, by: u64) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    *COUNTERS.lock().entry(name.to_string()).or_default() += by;
}

pub unsafe extern "C" fn tiledb_stats_enable() -> capi_return_t {
    ENABLED.store(true, Ordering::Relaxed);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_stats_disable() -> capi_return_t {
    ENABLED.store(false, Ordering::Relaxed);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_stats_reset() -> capi_return_t {
    COUNTERS.lock().clear();
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_stats_is_enabled(enabled: *mut u8) -> capi_return_t {
    match unsafe { enabled.as_mut() } {
        Some(slot) => {
            *slot = ENABLED.load(Ordering::Relaxed) as u8;
            TILEDB_OK
        }
        None => TILEDB_ERR,
    }
}

/// Dump all counters as `[{"timers": {...}, "counters": {...}}]`.
pub unsafe extern "C" fn tiledb_stats_raw_dump_str(out: *mut *mut c_char) -> capi_return_t {
    let Some(slot) = (unsafe { out.as_mut() }) else {
        return TILEDB_ERR;
    };
    let counters = COUNTERS.lock().clone();
    let dump = serde_json::json!([{ "timers": {}, "counters": counters }]);
    *slot = c_string(&dump.to_string()).into_raw();
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_stats_free_str(out: *mut *mut c_char) -> capi_return_t {
    let Some(slot) = (unsafe { out.as_mut() }) else {
        return TILEDB_ERR;
    };
    if !slot.is_null() {
        drop(unsafe { CString::from_raw(*slot) });
        *slot = std::ptr::null_mut();
    }
    TILEDB_OK
}
