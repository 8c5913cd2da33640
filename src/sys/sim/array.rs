//! Arrays, their metadata and consolidation plans.
//!
//! Arrays live in a process-wide registry keyed by URI. Each write commits an
//! immutable fragment covering one rectangle of the domain, stamped from a
//! logical clock; opening an array for reading snapshots the fragments
//! visible in its timestamp window. Where fragments overlap, the one with the
//! later timestamp wins.

use super::metadata::{Metadatum, write_metadatum};
use super::schema::{SchemaDef, tiledb_array_schema_evolution_t, tiledb_array_schema_t};
use super::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

/// Cells of one attribute in a fragment, in row-major order.
#[derive(Debug, Default)]
pub(crate) struct AttrData {
    pub(crate) values: Vec<u8>,
    /// Start of every cell in `values`, for variable-sized attributes.
    pub(crate) offsets: Option<Vec<u64>>,
    /// One byte per cell, zero for null, for nullable attributes.
    pub(crate) validity: Option<Vec<u8>>,
}

impl AttrData {
    fn size(&self) -> u64 {
        let offsets = self.offsets.as_ref().map_or(0, |o| o.len() * 8);
        let validity = self.validity.as_ref().map_or(0, Vec::len);
        (self.values.len() + offsets + validity) as u64
    }

    /// Bytes of cell `index`. `cell_size` is `None` for variable-sized cells.
    pub(crate) fn cell(&self, index: usize, cell_size: Option<u64>) -> &[u8] {
        let range = match (&self.offsets, cell_size) {
            (Some(offsets), _) => {
                let start = offsets.get(index).copied().unwrap_or(0) as usize;
                let end = offsets.get(index + 1).map_or(self.values.len(), |&o| o as usize);
                start..end
            }
            (None, Some(size)) => {
                let size = size as usize;
                index * size..(index + 1) * size
            }
            (None, None) => 0..0,
        };
        self.values.get(range).unwrap_or(&[])
    }

    pub(crate) fn is_valid(&self, index: usize) -> bool {
        self.validity
            .as_ref()
            .is_none_or(|v| v.get(index).is_some_and(|&b| b != 0))
    }
}

/// One committed write over the rectangle `ranges`.
#[derive(Debug)]
pub(crate) struct Fragment {
    pub(crate) uri: String,
    pub(crate) timestamp: u64,
    /// Inclusive range written on each dimension.
    pub(crate) ranges: Vec<(i64, i64)>,
    pub(crate) cells: u64,
    pub(crate) data: BTreeMap<String, AttrData>,
}

impl Fragment {
    pub(crate) fn size(&self) -> u64 {
        self.data.values().map(AttrData::size).sum()
    }

    /// Row-major index of `coord` within the fragment, if it covers it.
    pub(crate) fn position(&self, coord: &[i64]) -> Option<usize> {
        row_major_index(&self.ranges, coord)
    }
}

/// Row-major index of `coord` within the rectangle `ranges`.
pub(crate) fn row_major_index(ranges: &[(i64, i64)], coord: &[i64]) -> Option<usize> {
    let mut index = 0u64;
    for (&(low, high), &c) in ranges.iter().zip(coord) {
        if c < low || c > high {
            return None;
        }
        let extent = (high as i128 - low as i128 + 1) as u64;
        index = index * extent + (c as i128 - low as i128) as u64;
    }
    Some(index as usize)
}

struct StoredArray {
    schema: SchemaDef,
    fragments: Vec<Arc<Fragment>>,
    metadata: BTreeMap<String, Metadatum>,
}

static ARRAYS: LazyLock<Mutex<HashMap<String, StoredArray>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static CLOCK: AtomicU64 = AtomicU64::new(1);

fn tick() -> u64 {
    CLOCK.fetch_add(1, Ordering::SeqCst)
}

/// State captured when an array is opened.
#[derive(Clone)]
pub(crate) struct OpenArray {
    pub(crate) uri: String,
    pub(crate) query_type: tiledb_query_type_t,
    pub(crate) schema: SchemaDef,
    pub(crate) fragments: Vec<Arc<Fragment>>,
    /// Timestamp new fragments are stamped with, when pinned by the caller.
    pub(crate) write_timestamp: Option<u64>,
    metadata: BTreeMap<String, Metadatum>,
}

/// Append a fragment to the stored array at `uri`.
pub(crate) fn commit_fragment(
    uri: &str,
    timestamp: Option<u64>,
    ranges: Vec<(i64, i64)>,
    cells: u64,
    data: BTreeMap<String, AttrData>,
) -> Result<(), String> {
    let mut arrays = ARRAYS.lock();
    let Some(stored) = arrays.get_mut(uri) else {
        return Err(format!("Query: Cannot submit write; Array '{uri}' no longer exists"));
    };
    let timestamp = timestamp.unwrap_or_else(tick);
    let fragment = Fragment {
        uri: format!("{uri}/__fragments/__{timestamp}_{timestamp}_{}", stored.fragments.len()),
        timestamp,
        ranges,
        cells,
        data,
    };
    tracing::trace!(uri = %fragment.uri, cells, "committed fragment");
    stored.fragments.push(Arc::new(fragment));
    Ok(())
}

/// Current schema and every fragment of the stored array at `uri`.
pub(crate) fn stored_fragments(uri: &str) -> Option<(SchemaDef, Vec<Arc<Fragment>>)> {
    let arrays = ARRAYS.lock();
    let stored = arrays.get(uri)?;
    Some((stored.schema.clone(), stored.fragments.clone()))
}

pub(crate) fn array_exists(uri: &str) -> bool {
    ARRAYS.lock().contains_key(uri)
}

struct ArrayState {
    open: Option<OpenArray>,
    timestamp_start: u64,
    timestamp_end: u64,
}

pub struct tiledb_array_t {
    uri: String,
    state: Mutex<ArrayState>,
}

impl tiledb_array_t {
    pub(crate) fn opened(&self) -> Option<OpenArray> {
        self.state.lock().open.clone()
    }
}

pub struct tiledb_consolidation_plan_t {
    nodes: Vec<Vec<CString>>,
}

pub unsafe extern "C" fn tiledb_array_create(
    ctx: *mut tiledb_ctx_t,
    array_uri: *const c_char,
    array_schema: *mut tiledb_array_schema_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, array_uri, "array URI");
    let schema = sim_arg!(ctx, array_schema, "array schema").def();
    if let Err(message) = schema.check() {
        return ctx.fail(format!("Cannot create array '{uri}'; {message}"));
    }
    let mut arrays = ARRAYS.lock();
    if arrays.contains_key(uri) {
        return ctx.fail(format!("Cannot create array; Array '{uri}' already exists"));
    }
    arrays.insert(
        uri.to_string(),
        StoredArray {
            schema,
            fragments: Vec::new(),
            metadata: BTreeMap::new(),
        },
    );
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_evolve(
    ctx: *mut tiledb_ctx_t,
    array_uri: *const c_char,
    evolution: *mut tiledb_array_schema_evolution_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, array_uri, "array URI");
    let evolution = sim_arg!(ctx, evolution, "array schema evolution");
    let mut arrays = ARRAYS.lock();
    let Some(stored) = arrays.get_mut(uri) else {
        return ctx.fail(format!("Cannot evolve array; Array '{uri}' does not exist"));
    };
    let mut schema = stored.schema.clone();
    if let Err(message) = evolution.apply(&mut schema) {
        return ctx.fail(message);
    }
    stored.schema = schema;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_alloc(
    ctx: *mut tiledb_ctx_t,
    array_uri: *const c_char,
    array: *mut *mut tiledb_array_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, array_uri, "array URI");
    let value = tiledb_array_t {
        uri: uri.to_string(),
        state: Mutex::new(ArrayState {
            open: None,
            timestamp_start: 0,
            timestamp_end: u64::MAX,
        }),
    };
    sim_out!(ctx, array, boxed(value, "array"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_free(array: *mut *mut tiledb_array_t) {
    unsafe { release(array, "array") }
}

pub unsafe extern "C" fn tiledb_array_open(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    query_type: tiledb_query_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    if query_type > TILEDB_MODIFY_EXCLUSIVE {
        return ctx.fail(format!("Cannot open array; Unknown query type {query_type}"));
    }
    let mut state = array.state.lock();
    if state.open.is_some() {
        return ctx.fail(format!("Cannot open array '{}'; Array is already open", array.uri));
    }
    let arrays = ARRAYS.lock();
    let Some(stored) = arrays.get(&array.uri) else {
        return ctx.fail(format!("Cannot open array; Array '{}' does not exist", array.uri));
    };
    let (start, end) = (state.timestamp_start, state.timestamp_end);
    let fragments = stored
        .fragments
        .iter()
        .filter(|f| f.timestamp >= start && f.timestamp <= end)
        .cloned()
        .collect();
    state.open = Some(OpenArray {
        uri: array.uri.clone(),
        query_type,
        schema: stored.schema.clone(),
        fragments,
        write_timestamp: (end != u64::MAX).then_some(end),
        metadata: stored.metadata.clone(),
    });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_close(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    array.state.lock().open = None;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_is_open(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    is_open: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    sim_out!(ctx, is_open, array.state.lock().open.is_some() as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_get_query_type(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    query_type: *mut tiledb_query_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let Some(open) = array.opened() else {
        return ctx.fail(format!("Cannot get query type; Array '{}' is not open", array.uri));
    };
    sim_out!(ctx, query_type, open.query_type);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_set_open_timestamp_start(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    timestamp_start: u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    array.state.lock().timestamp_start = timestamp_start;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_set_open_timestamp_end(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    timestamp_end: u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    array.state.lock().timestamp_end = timestamp_end;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_get_schema(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    array_schema: *mut *mut tiledb_array_schema_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let Some(open) = array.opened() else {
        return ctx.fail(format!("Cannot get array schema; Array '{}' is not open", array.uri));
    };
    let schema = tiledb_array_schema_t::from_def(open.schema);
    sim_out!(ctx, array_schema, boxed(schema, "array_schema"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_put_metadata(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    key: *const c_char,
    value_type: tiledb_datatype_t,
    value_num: u32,
    value: *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let key = sim_str!(ctx, key, "metadata key");
    match array.opened() {
        Some(open) if open.query_type == TILEDB_WRITE => {}
        _ => {
            return ctx.fail(format!(
                "Cannot put metadata '{key}'; Array '{}' must be opened in WRITE mode",
                array.uri
            ));
        }
    }
    let datum = match unsafe { Metadatum::from_raw(value_type, value_num, value) } {
        Ok(datum) => datum,
        Err(message) => return ctx.fail(format!("Cannot put metadata '{key}'; {message}")),
    };
    let mut arrays = ARRAYS.lock();
    let Some(stored) = arrays.get_mut(&array.uri) else {
        return ctx.fail(format!("Cannot put metadata; Array '{}' does not exist", array.uri));
    };
    stored.metadata.insert(key.to_string(), datum);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_get_metadata(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    key: *const c_char,
    value_type: *mut tiledb_datatype_t,
    value_num: *mut u32,
    value: *mut *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let key = sim_str!(ctx, key, "metadata key");
    let state = array.state.lock();
    let open = match state.open.as_ref() {
        Some(open) if open.query_type == TILEDB_READ => open,
        _ => {
            return ctx.fail(format!(
                "Cannot get metadata '{key}'; Array '{}' must be opened in READ mode",
                array.uri
            ));
        }
    };
    // The returned pointer stays valid until the array is closed.
    unsafe { write_metadatum(ctx, open.metadata.get(key), value_type, value_num, value) }
}

pub unsafe extern "C" fn tiledb_array_delete_metadata(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    key: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let key = sim_str!(ctx, key, "metadata key");
    match array.opened() {
        Some(open) if open.query_type == TILEDB_WRITE => {}
        _ => {
            return ctx.fail(format!(
                "Cannot delete metadata '{key}'; Array '{}' must be opened in WRITE mode",
                array.uri
            ));
        }
    }
    if let Some(stored) = ARRAYS.lock().get_mut(&array.uri) {
        stored.metadata.remove(key);
    }
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_get_metadata_num(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let count = match array.opened() {
        Some(open) if open.query_type == TILEDB_READ => open.metadata.len() as u64,
        _ => {
            return ctx.fail(format!(
                "Cannot get number of metadata; Array '{}' must be opened in READ mode",
                array.uri
            ));
        }
    };
    sim_out!(ctx, num, count);
    TILEDB_OK
}

/// Group consecutive fragments whose combined size fits `fragment_size`;
/// groups of one are left alone.
fn plan_nodes(fragments: &[Arc<Fragment>], fragment_size: u64) -> Vec<Vec<String>> {
    let mut nodes = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_size = 0;
    for fragment in fragments {
        let size = fragment.size();
        if !current.is_empty() && current_size + size > fragment_size {
            if current.len() > 1 {
                nodes.push(std::mem::take(&mut current));
            }
            current.clear();
            current_size = 0;
        }
        current.push(fragment.uri.clone());
        current_size += size;
    }
    if current.len() > 1 {
        nodes.push(current);
    }
    nodes
}

pub unsafe extern "C" fn tiledb_consolidation_plan_create_with_mbr(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    fragment_size: u64,
    consolidation_plan: *mut *mut tiledb_consolidation_plan_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let Some(open) = array.opened() else {
        return ctx.fail(format!(
            "Cannot create consolidation plan; Array '{}' is not open",
            array.uri
        ));
    };
    let nodes = plan_nodes(&open.fragments, fragment_size)
        .into_iter()
        .map(|uris| uris.iter().map(|uri| c_string(uri)).collect())
        .collect();
    let plan = tiledb_consolidation_plan_t { nodes };
    sim_out!(ctx, consolidation_plan, boxed(plan, "consolidation_plan"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_consolidation_plan_free(
    consolidation_plan: *mut *mut tiledb_consolidation_plan_t,
) {
    unsafe { release(consolidation_plan, "consolidation_plan") }
}

pub unsafe extern "C" fn tiledb_consolidation_plan_get_num_nodes(
    ctx: *mut tiledb_ctx_t,
    consolidation_plan: *mut tiledb_consolidation_plan_t,
    num_nodes: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let plan = sim_arg!(ctx, consolidation_plan, "consolidation plan");
    sim_out!(ctx, num_nodes, plan.nodes.len() as u64);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_consolidation_plan_get_num_fragments(
    ctx: *mut tiledb_ctx_t,
    consolidation_plan: *mut tiledb_consolidation_plan_t,
    node_index: u64,
    num_fragments: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let plan = sim_arg!(ctx, consolidation_plan, "consolidation plan");
    let Some(node) = plan.nodes.get(node_index as usize) else {
        return ctx.fail(format!("ConsolidationPlan: Node index {node_index} out of bounds"));
    };
    sim_out!(ctx, num_fragments, node.len() as u64);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_consolidation_plan_get_fragment_uri(
    ctx: *mut tiledb_ctx_t,
    consolidation_plan: *mut tiledb_consolidation_plan_t,
    node_index: u64,
    fragment_index: u64,
    uri: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let plan = sim_arg!(ctx, consolidation_plan, "consolidation plan");
    let Some(found) = plan
        .nodes
        .get(node_index as usize)
        .and_then(|node| node.get(fragment_index as usize))
    else {
        return ctx.fail(format!(
            "ConsolidationPlan: Fragment index {fragment_index} of node {node_index} out of bounds"
        ));
    };
    sim_out!(ctx, uri, found.as_ptr());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_consolidation_plan_dump_json_str(
    ctx: *mut tiledb_ctx_t,
    consolidation_plan: *const tiledb_consolidation_plan_t,
    out: *mut *mut c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let plan = sim_arg!(ctx, consolidation_plan, "consolidation plan");
    let nodes: Vec<_> = plan
        .nodes
        .iter()
        .map(|node| {
            let uris: Vec<_> = node.iter().map(|uri| uri.to_string_lossy().into_owned()).collect();
            serde_json::json!({ "uri": uris })
        })
        .collect();
    let json = serde_json::json!({ "nodes": nodes }).to_string();
    sim_out!(ctx, out, c_string(&json).into_raw());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_consolidation_plan_free_json_str(out: *mut *mut c_char) -> capi_return_t {
    let Some(slot) = (unsafe { out.as_mut() }) else {
        return TILEDB_ERR;
    };
    if !slot.is_null() {
        drop(unsafe { CString::from_raw(*slot) });
        *slot = std::ptr::null_mut();
    }
    TILEDB_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(uri: &str, bytes: usize) -> Arc<Fragment> {
        let data = AttrData {
            values: vec![0; bytes],
            ..AttrData::default()
        };
        Arc::new(Fragment {
            uri: uri.to_string(),
            timestamp: 1,
            ranges: vec![(1, bytes as i64)],
            cells: bytes as u64,
            data: BTreeMap::from([("a".to_string(), data)]),
        })
    }

    #[test]
    fn test_plan_groups_small_neighbours() {
        let fragments = vec![
            fragment("f1", 10),
            fragment("f2", 10),
            fragment("f3", 100),
            fragment("f4", 5),
        ];
        let nodes = plan_nodes(&fragments, 25);
        assert_eq!(nodes, vec![vec!["f1".to_string(), "f2".to_string()]]);
    }

    #[test]
    fn test_position_is_row_major() {
        let fragment = Fragment {
            uri: String::new(),
            timestamp: 1,
            ranges: vec![(1, 2), (10, 12)],
            cells: 6,
            data: BTreeMap::new(),
        };
        assert_eq!(fragment.position(&[1, 10]), Some(0));
        assert_eq!(fragment.position(&[1, 12]), Some(2));
        assert_eq!(fragment.position(&[2, 11]), Some(4));
        assert_eq!(fragment.position(&[3, 11]), None);
    }

    #[test]
    fn test_var_cells_read_through_offsets() {
        let data = AttrData {
            values: b"abcde".to_vec(),
            offsets: Some(vec![0, 2, 2]),
            validity: Some(vec![1, 0, 1]),
        };
        assert_eq!(data.cell(0, None), b"ab");
        assert_eq!(data.cell(1, None), b"");
        assert_eq!(data.cell(2, None), b"cde");
        assert!(!data.is_valid(1));
        assert!(data.is_valid(2));
    }

    #[test]
    fn test_plan_skips_singletons() {
        let fragments = vec![fragment("f1", 50), fragment("f2", 50)];
        assert!(plan_nodes(&fragments, 10).is_empty());
    }
}
