//! Configuration objects and their iterators.

use super::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;

const DEFAULTS: &[(&str, &str)] = &[
    ("rest.server_address", "https://api.tiledb.com"),
    ("sm.check_coord_dups", "true"),
    ("sm.compute_concurrency_level", "8"),
    ("sm.dedup_coords", "false"),
    ("sm.io_concurrency_level", "8"),
    ("sm.memory_budget", "5368709120"),
    ("sm.tile_cache_size", "10000000"),
    ("vfs.file.posix_file_permissions", "644"),
    ("vfs.s3.region", "us-east-1"),
];

const BOOL_PARAMS: &[&str] = &["sm.check_coord_dups", "sm.dedup_coords"];

const UINT_PARAMS: &[&str] = &[
    "sm.compute_concurrency_level",
    "sm.io_concurrency_level",
    "sm.memory_budget",
    "sm.tile_cache_size",
    "sim.submit_delay_ms",
];

pub struct tiledb_config_t {
    params: Mutex<BTreeMap<String, CString>>,
}

impl tiledb_config_t {
    pub(crate) fn with_defaults() -> Self {
        let params = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), c_string(v)))
            .collect();
        Self::from_params(params)
    }

    pub(crate) fn from_params(params: BTreeMap<String, CString>) -> Self {
        Self {
            params: Mutex::new(params),
        }
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<String, CString> {
        self.params.lock().clone()
    }

    pub(crate) fn lookup(&self, param: &str) -> Option<String> {
        self.params
            .lock()
            .get(param)
            .map(|v| v.to_string_lossy().into_owned())
    }

    fn set(&self, param: &str, value: &str) -> Result<(), String> {
        validate(param, value)?;
        self.params.lock().insert(param.to_string(), c_string(value));
        Ok(())
    }
}

fn validate(param: &str, value: &str) -> Result<(), String> {
    let valid = if BOOL_PARAMS.contains(&param) {
        value == "true" || value == "false"
    } else if UINT_PARAMS.contains(&param) {
        value.parse::<u64>().is_ok()
    } else {
        true
    };
    if valid {
        Ok(())
    } else {
        Err(format!(
            "Config: Failed to set config parameter '{param}'; invalid value '{value}'"
        ))
    }
}

pub struct tiledb_config_iter_t {
    entries: Vec<(CString, CString)>,
    position: usize,
}

pub unsafe extern "C" fn tiledb_config_alloc(
    config: *mut *mut tiledb_config_t,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(slot) = (unsafe { config.as_mut() }) else {
        return unsafe { set_error(error, "Cannot create config; invalid output pointer") };
    };
    *slot = boxed(tiledb_config_t::with_defaults(), "config");
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_free(config: *mut *mut tiledb_config_t) {
    unsafe { release(config, "config") }
}

pub unsafe extern "C" fn tiledb_config_set(
    config: *mut tiledb_config_t,
    param: *const c_char,
    value: *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot set parameter; invalid config object") };
    };
    let (Some(param), Some(value)) = (unsafe { str_arg(param) }, unsafe { str_arg(value) }) else {
        return unsafe { set_error(error, "Cannot set parameter; invalid parameter or value") };
    };
    match config.set(param, value) {
        Ok(()) => {
            unsafe { clear_error(error) };
            TILEDB_OK
        }
        Err(message) => unsafe { set_error(error, &message) },
    }
}

pub unsafe extern "C" fn tiledb_config_get(
    config: *mut tiledb_config_t,
    param: *const c_char,
    value: *mut *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot get parameter; invalid config object") };
    };
    let Some(param) = (unsafe { str_arg(param) }) else {
        return unsafe { set_error(error, "Cannot get parameter; invalid parameter") };
    };
    let Some(slot) = (unsafe { value.as_mut() }) else {
        return unsafe { set_error(error, "Cannot get parameter; invalid output pointer") };
    };
    // The returned pointer stays valid until the parameter is modified.
    *slot = config
        .params
        .lock()
        .get(param)
        .map_or(std::ptr::null(), |v| v.as_ptr());
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_unset(
    config: *mut tiledb_config_t,
    param: *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot unset parameter; invalid config object") };
    };
    let Some(param) = (unsafe { str_arg(param) }) else {
        return unsafe { set_error(error, "Cannot unset parameter; invalid parameter") };
    };
    let mut params = config.params.lock();
    match DEFAULTS.iter().find(|(k, _)| *k == param) {
        Some((_, default)) => {
            params.insert(param.to_string(), c_string(default));
        }
        None => {
            params.remove(param);
        }
    }
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_load_from_file(
    config: *mut tiledb_config_t,
    filename: *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot load config; invalid config object") };
    };
    let Some(filename) = (unsafe { str_arg(filename) }) else {
        return unsafe { set_error(error, "Cannot load config; invalid filename") };
    };
    let contents = match std::fs::read_to_string(local_path(filename)) {
        Ok(contents) => contents,
        Err(e) => {
            let message = format!("Config: Failed to open config file '{filename}': {e}");
            return unsafe { set_error(error, &message) };
        }
    };
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((param, value)) = line.split_once(char::is_whitespace) else {
            let message = format!(
                "Config: Failed to load config file '{filename}'; malformed line {}",
                number + 1
            );
            return unsafe { set_error(error, &message) };
        };
        if let Err(message) = config.set(param, value.trim()) {
            return unsafe { set_error(error, &message) };
        }
    }
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_save_to_file(
    config: *mut tiledb_config_t,
    filename: *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot save config; invalid config object") };
    };
    let Some(filename) = (unsafe { str_arg(filename) }) else {
        return unsafe { set_error(error, "Cannot save config; invalid filename") };
    };
    let written = std::fs::File::create(local_path(filename)).and_then(|mut file| {
        for (param, value) in config.params.lock().iter() {
            writeln!(file, "{param} {}", value.to_string_lossy())?;
        }
        file.sync_all()
    });
    match written {
        Ok(()) => {
            unsafe { clear_error(error) };
            TILEDB_OK
        }
        Err(e) => {
            let message = format!("Config: Failed to save config file '{filename}': {e}");
            unsafe { set_error(error, &message) }
        }
    }
}

pub unsafe extern "C" fn tiledb_config_compare(
    lhs: *mut tiledb_config_t,
    rhs: *mut tiledb_config_t,
    equal: *mut u8,
) -> capi_return_t {
    let (Some(lhs), Some(rhs), Some(equal)) =
        (unsafe { lhs.as_ref() }, unsafe { rhs.as_ref() }, unsafe { equal.as_mut() })
    else {
        return TILEDB_ERR;
    };
    *equal = if std::ptr::eq(lhs, rhs) {
        1
    } else {
        (lhs.snapshot() == rhs.snapshot()) as u8
    };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_iter_alloc(
    config: *mut tiledb_config_t,
    prefix: *const c_char,
    config_iter: *mut *mut tiledb_config_iter_t,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return unsafe { set_error(error, "Cannot create config iterator; invalid config object") };
    };
    let prefix = unsafe { str_arg(prefix) }.unwrap_or("");
    let Some(slot) = (unsafe { config_iter.as_mut() }) else {
        return unsafe { set_error(error, "Cannot create config iterator; invalid output pointer") };
    };
    // Parameter names are reported with the prefix stripped.
    let entries = config
        .snapshot()
        .into_iter()
        .filter_map(|(param, value)| {
            param
                .strip_prefix(prefix)
                .map(|stripped| (c_string(stripped), value))
        })
        .collect();
    *slot = boxed(tiledb_config_iter_t { entries, position: 0 }, "config_iter");
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_iter_free(config_iter: *mut *mut tiledb_config_iter_t) {
    unsafe { release(config_iter, "config_iter") }
}

pub unsafe extern "C" fn tiledb_config_iter_here(
    config_iter: *mut tiledb_config_iter_t,
    param: *mut *const c_char,
    value: *mut *const c_char,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(iter) = (unsafe { config_iter.as_ref() }) else {
        return unsafe { set_error(error, "Cannot get config item; invalid iterator") };
    };
    let Some((p, v)) = iter.entries.get(iter.position) else {
        return unsafe { set_error(error, "Cannot get config item; iterator is done") };
    };
    let (Some(param), Some(value)) = (unsafe { param.as_mut() }, unsafe { value.as_mut() }) else {
        return unsafe { set_error(error, "Cannot get config item; invalid output pointer") };
    };
    *param = p.as_ptr();
    *value = v.as_ptr();
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_iter_next(
    config_iter: *mut tiledb_config_iter_t,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let Some(iter) = (unsafe { config_iter.as_mut() }) else {
        return unsafe { set_error(error, "Cannot advance config iterator; invalid iterator") };
    };
    if iter.position < iter.entries.len() {
        iter.position += 1;
    }
    unsafe { clear_error(error) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_config_iter_done(
    config_iter: *mut tiledb_config_iter_t,
    done: *mut i32,
    error: *mut *mut tiledb_error_t,
) -> capi_return_t {
    let (Some(iter), Some(done)) = (unsafe { config_iter.as_ref() }, unsafe { done.as_mut() }) else {
        return unsafe { set_error(error, "Cannot check config iterator; invalid argument") };
    };
    *done = (iter.position >= iter.entries.len()) as i32;
    unsafe { clear_error(error) };
    TILEDB_OK
}
