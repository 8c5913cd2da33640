//! Process-wide engine statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sys;
use crate::util::cstr_to_string;

/// One entry of the engine's raw statistics dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub timers: BTreeMap<String, f64>,
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

fn check(operation: &str, status: sys::capi_return_t) -> Result<()> {
    if status == sys::TILEDB_OK {
        return Ok(());
    }
    Err(Error::InvalidState(format!("{operation} failed with status {status}")))
}

pub fn enable() -> Result<()> {
    check("enable statistics", unsafe { sys::tiledb_stats_enable() })
}

pub fn disable() -> Result<()> {
    check("disable statistics", unsafe { sys::tiledb_stats_disable() })
}

pub fn reset() -> Result<()> {
    check("reset statistics", unsafe { sys::tiledb_stats_reset() })
}

pub fn is_enabled() -> Result<bool> {
    let mut enabled = 0u8;
    check("query statistics state", unsafe { sys::tiledb_stats_is_enabled(&mut enabled) })?;
    Ok(enabled != 0)
}

/// Decode the engine's raw statistics dump.
pub fn raw() -> Result<Vec<StatsSnapshot>> {
    let mut dump = std::ptr::null_mut();
    check("dump statistics", unsafe { sys::tiledb_stats_raw_dump_str(&mut dump) })?;
    let text = unsafe { cstr_to_string(dump, "stats") };
    if unsafe { sys::tiledb_stats_free_str(&mut dump) } != sys::TILEDB_OK {
        tracing::warn!("failed to free statistics dump");
    }
    Ok(serde_json::from_str(&text?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn allocations(snapshots: &[StatsSnapshot]) -> u64 {
        snapshots
            .iter()
            .flat_map(|s| s.counters.iter())
            .filter(|(name, _)| name.contains(".alloc."))
            .map(|(_, count)| *count)
            .sum()
    }

    // Statistics are global, so every check lives in one test.
    #[test]
    fn test_enable_collect_reset() {
        enable().unwrap();
        assert!(is_enabled().unwrap());
        reset().unwrap();
        let config = Config::new().unwrap();
        drop(config);
        let snapshots = raw().unwrap();
        assert!(!snapshots.is_empty());
        assert!(allocations(&snapshots) >= 1);

        disable().unwrap();
        assert!(!is_enabled().unwrap());
        reset().unwrap();
        let _config = Config::new().unwrap();
        assert_eq!(allocations(&raw().unwrap()), 0);
    }

    #[test]
    fn test_snapshot_decodes_missing_sections() {
        let snapshots: Vec<StatsSnapshot> = serde_json::from_str(r#"[{"counters":{"reads":3}}]"#).unwrap();
        assert_eq!(snapshots[0].counter("reads"), 3);
        assert_eq!(snapshots[0].counter("writes"), 0);
        assert!(snapshots[0].timers.is_empty());
    }
}
