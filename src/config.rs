//! Engine configuration.
//!
//! Config calls have no context, so failures are read from the out-of-band
//! error object each call returns.

use std::path::Path;
use std::ptr;

use crate::error::{Error, Result};
use crate::handle::{CapiHandle, ConfigHandle, ConfigIterHandle};
use crate::sys::{self, c_char};
use crate::util::{cstr_to_option_string, cstr_to_string, cstring, out_of_band, path_cstring};
use crate::value::Value;

/// A set of string-keyed engine parameters.
#[derive(Debug, Clone)]
pub struct Config {
    handle: ConfigHandle,
}

impl Config {
    /// Create a config holding the engine defaults.
    pub fn new() -> Result<Self> {
        let mut raw = ptr::null_mut();
        let mut error = ptr::null_mut();
        let status = unsafe { sys::tiledb_config_alloc(&mut raw, &mut error) };
        if status != sys::TILEDB_OK {
            return Err(Error::Allocation {
                kind: ConfigHandle::KIND,
                message: unsafe { crate::util::error_object_message(error) },
            });
        }
        Self::from_raw(raw)
    }

    pub(crate) fn from_raw(raw: *mut sys::tiledb_config_t) -> Result<Self> {
        match unsafe { ConfigHandle::from_raw(raw) } {
            Some(handle) => Ok(Self { handle }),
            None => Err(Error::Allocation {
                kind: ConfigHandle::KIND,
                message: "engine returned a null config".into(),
            }),
        }
    }

    /// Create a config and load parameters from a `key value` text file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::new()?;
        let c_path = path_cstring("path", path)?;
        out_of_band(
            || format!("load config from '{}'", path.display()),
            |err| unsafe { sys::tiledb_config_load_from_file(config.raw(), c_path.as_ptr(), err) },
        )?;
        Ok(config)
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_config_t {
        self.handle.get().as_ptr()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let c_key = cstring("key", key)?;
        let c_value = cstring("value", value)?;
        out_of_band(
            || format!("set config '{key}' to '{value}'"),
            |err| unsafe { sys::tiledb_config_set(self.raw(), c_key.as_ptr(), c_value.as_ptr(), err) },
        )
    }

    /// Set a parameter from any supported primitive.
    pub fn set_value(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set(key, &value.into().to_string())
    }

    /// Read a parameter; `None` when it is not set.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let c_key = cstring("key", key)?;
        let mut value: *const c_char = ptr::null();
        out_of_band(
            || format!("get config '{key}'"),
            |err| unsafe { sys::tiledb_config_get(self.raw(), c_key.as_ptr(), &mut value, err) },
        )?;
        unsafe { cstr_to_option_string(value, "value") }
    }

    /// Reset a parameter to its default, or remove it if it has none.
    pub fn unset(&self, key: &str) -> Result<()> {
        let c_key = cstring("key", key)?;
        out_of_band(
            || format!("unset config '{key}'"),
            |err| unsafe { sys::tiledb_config_unset(self.raw(), c_key.as_ptr(), err) },
        )
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let c_path = path_cstring("path", path)?;
        out_of_band(
            || format!("save config to '{}'", path.display()),
            |err| unsafe { sys::tiledb_config_save_to_file(self.raw(), c_path.as_ptr(), err) },
        )
    }

    /// Iterate over parameters whose key starts with `prefix`. Keys are
    /// returned with the prefix stripped.
    pub fn iter(&self, prefix: Option<&str>) -> Result<ConfigIter> {
        let c_prefix = prefix.map(|p| cstring("prefix", p)).transpose()?;
        let prefix_ptr = c_prefix.as_ref().map_or(ptr::null(), |p| p.as_ptr());
        let mut raw = ptr::null_mut();
        out_of_band(
            || format!("iterate config with prefix {prefix:?}"),
            |err| unsafe { sys::tiledb_config_iter_alloc(self.raw(), prefix_ptr, &mut raw, err) },
        )?;
        match unsafe { ConfigIterHandle::from_raw(raw) } {
            Some(handle) => Ok(ConfigIter {
                handle,
                _config: self.clone(),
            }),
            None => Err(Error::Allocation {
                kind: ConfigIterHandle::KIND,
                message: "engine returned a null config iterator".into(),
            }),
        }
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        let mut equal = 0u8;
        let status = unsafe { sys::tiledb_config_compare(self.raw(), other.raw(), &mut equal) };
        status == sys::TILEDB_OK && equal == 1
    }
}

/// Iterator over `(key, value)` pairs of a [`Config`].
#[derive(Debug)]
pub struct ConfigIter {
    handle: ConfigIterHandle,
    _config: Config,
}

impl ConfigIter {
    fn raw(&self) -> *mut sys::tiledb_config_iter_t {
        self.handle.get().as_ptr()
    }

    fn done(&self) -> Result<bool> {
        let mut done = 0;
        out_of_band(
            || "check config iterator".into(),
            |err| unsafe { sys::tiledb_config_iter_done(self.raw(), &mut done, err) },
        )?;
        Ok(done != 0)
    }

    fn here(&self) -> Result<(String, String)> {
        let mut param: *const c_char = ptr::null();
        let mut value: *const c_char = ptr::null();
        out_of_band(
            || "read config iterator".into(),
            |err| unsafe { sys::tiledb_config_iter_here(self.raw(), &mut param, &mut value, err) },
        )?;
        let param = unsafe { cstr_to_string(param, "param") }?;
        let value = unsafe { cstr_to_string(value, "value") }?;
        Ok((param, value))
    }

    fn advance(&self) -> Result<()> {
        out_of_band(
            || "advance config iterator".into(),
            |err| unsafe { sys::tiledb_config_iter_next(self.raw(), err) },
        )
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

impl Iterator for ConfigIter {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.done() {
            Ok(true) => None,
            Ok(false) => {
                let entry = self.here();
                if entry.is_ok() {
                    if let Err(err) = self.advance() {
                        return Some(Err(err));
                    }
                }
                Some(entry)
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_integer_round_trip() {
        let config = Config::new().unwrap();
        config.set("x", "4294967296").unwrap();
        assert_eq!(config.get("x").unwrap().as_deref(), Some("4294967296"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let config = Config::new().unwrap();
        assert_eq!(config.get("no.such.key").unwrap(), None);
    }

    #[test]
    fn test_set_value_formats_primitives() {
        let config = Config::new().unwrap();
        config.set_value("sm.memory_budget", 1024u64).unwrap();
        config.set_value("sm.dedup_coords", true).unwrap();
        assert_eq!(config.get("sm.memory_budget").unwrap().as_deref(), Some("1024"));
        assert_eq!(config.get("sm.dedup_coords").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_invalid_value_names_the_parameter() {
        let config = Config::new().unwrap();
        let err = config.set("sm.io_concurrency_level", "lots").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("sm.io_concurrency_level"));
        assert!(text.contains("lots"));
    }

    #[test]
    fn test_unset_restores_default() {
        let config = Config::new().unwrap();
        config.set("sm.tile_cache_size", "1").unwrap();
        config.unset("sm.tile_cache_size").unwrap();
        assert_eq!(config.get("sm.tile_cache_size").unwrap().as_deref(), Some("10000000"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiledb.cfg");
        let config = Config::new().unwrap();
        config.set("vfs.s3.region", "eu-west-1").unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.get("vfs.s3.region").unwrap().as_deref(), Some("eu-west-1"));
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.cfg");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.cfg"));
    }

    #[test]
    fn test_iter_with_prefix() {
        let config = Config::new().unwrap();
        let entries: Vec<_> = config
            .iter(Some("vfs.s3."))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(entries.contains(&("region".to_string(), "us-east-1".to_string())));
    }

    #[test]
    fn test_equality_tracks_changes() {
        let a = Config::new().unwrap();
        let b = Config::new().unwrap();
        assert_eq!(a, b);
        b.set("sm.memory_budget", "1").unwrap();
        assert_ne!(a, b);
    }
}
