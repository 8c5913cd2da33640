//! Fragment listings for stored arrays.

use super::array::{Fragment, stored_fragments};
use super::schema::{SchemaDef, tiledb_array_schema_t};
use super::subarray::encode_coord;
use super::*;
use parking_lot::Mutex;

/// On-disk format version reported for every fragment.
const FORMAT_VERSION: u32 = 22;

struct FragmentSummary {
    uri: CString,
    timestamp: u64,
    size: u64,
    cells: u64,
    /// Non-empty domain per dimension, low and high bounds back to back.
    domain: Vec<Vec<u8>>,
}

impl FragmentSummary {
    fn new(fragment: &Fragment, schema: &SchemaDef) -> Self {
        let domain = schema
            .dims
            .iter()
            .zip(&fragment.ranges)
            .map(|(dim, &(low, high))| {
                let mut bytes = encode_coord(dim.datatype, low);
                bytes.extend(encode_coord(dim.datatype, high));
                bytes
            })
            .collect();
        Self {
            uri: c_string(&fragment.uri),
            timestamp: fragment.timestamp,
            size: fragment.size(),
            cells: fragment.cells,
            domain,
        }
    }
}

struct Loaded {
    schema: SchemaDef,
    fragments: Vec<FragmentSummary>,
}

pub struct tiledb_fragment_info_t {
    uri: String,
    loaded: Mutex<Option<Loaded>>,
}

impl tiledb_fragment_info_t {
    /// Run `f` against fragment `fid`, failing when not loaded or out of range.
    fn with_fragment<R>(
        &self,
        fid: u32,
        f: impl FnOnce(&FragmentSummary, &SchemaDef) -> Result<R, String>,
    ) -> Result<R, String> {
        let loaded = self.loaded.lock();
        let Some(loaded) = loaded.as_ref() else {
            return Err("FragmentInfo: Fragment info has not been loaded".into());
        };
        let Some(fragment) = loaded.fragments.get(fid as usize) else {
            return Err(format!(
                "FragmentInfo: Cannot get fragment {fid}; Index out of bounds ({} fragments)",
                loaded.fragments.len()
            ));
        };
        f(fragment, &loaded.schema)
    }

    fn fragment_num(&self) -> Result<u32, String> {
        self.loaded
            .lock()
            .as_ref()
            .map(|l| l.fragments.len() as u32)
            .ok_or_else(|| "FragmentInfo: Fragment info has not been loaded".into())
    }
}

/// Report `result` through the context, writing `value` on success.
macro_rules! fragment_out {
    ($ctx:expr, $slot:expr, $result:expr) => {
        match $result {
            Ok(value) => {
                sim_out!($ctx, $slot, value);
                TILEDB_OK
            }
            Err(message) => $ctx.fail(message),
        }
    };
}

pub unsafe extern "C" fn tiledb_fragment_info_alloc(
    ctx: *mut tiledb_ctx_t,
    array_uri: *const c_char,
    fragment_info: *mut *mut tiledb_fragment_info_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, array_uri, "array URI");
    let value = tiledb_fragment_info_t {
        uri: uri.to_string(),
        loaded: Mutex::new(None),
    };
    sim_out!(ctx, fragment_info, boxed(value, "fragment_info"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_fragment_info_free(fragment_info: *mut *mut tiledb_fragment_info_t) {
    unsafe { release(fragment_info, "fragment_info") }
}

pub unsafe extern "C" fn tiledb_fragment_info_load(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    let Some((schema, fragments)) = stored_fragments(&info.uri) else {
        return ctx.fail(format!("FragmentInfo: Cannot load fragment info; Array '{}' does not exist", info.uri));
    };
    let fragments = fragments.iter().map(|f| FragmentSummary::new(f, &schema)).collect();
    *info.loaded.lock() = Some(Loaded { schema, fragments });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_fragment_info_get_fragment_num(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fragment_num: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, fragment_num, info.fragment_num())
}

pub unsafe extern "C" fn tiledb_fragment_info_get_fragment_uri(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    uri: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    // The summary lives until the next load or free, like the native pointer.
    fragment_out!(ctx, uri, info.with_fragment(fid, |f, _| Ok(f.uri.as_ptr())))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_fragment_size(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, size, info.with_fragment(fid, |f, _| Ok(f.size)))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_dense(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    dense: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    let result = info.with_fragment(fid, |_, schema| Ok((schema.array_type == TILEDB_DENSE) as i32));
    fragment_out!(ctx, dense, result)
}

pub unsafe extern "C" fn tiledb_fragment_info_get_sparse(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    sparse: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    let result = info.with_fragment(fid, |_, schema| Ok((schema.array_type == TILEDB_SPARSE) as i32));
    fragment_out!(ctx, sparse, result)
}

pub unsafe extern "C" fn tiledb_fragment_info_get_timestamp_range(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    start: *mut u64,
    end: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    match info.with_fragment(fid, |f, _| Ok(f.timestamp)) {
        Ok(timestamp) => {
            sim_out!(ctx, start, timestamp);
            sim_out!(ctx, end, timestamp);
            TILEDB_OK
        }
        Err(message) => ctx.fail(message),
    }
}

unsafe fn copy_domain(
    ctx: &tiledb_ctx_t,
    info: &tiledb_fragment_info_t,
    fid: u32,
    dim: impl FnOnce(&SchemaDef) -> Result<usize, String>,
    domain: *mut c_void,
) -> capi_return_t {
    if domain.is_null() {
        return ctx.fail("Invalid output pointer");
    }
    let result = info.with_fragment(fid, |f, schema| {
        let index = dim(schema)?;
        f.domain
            .get(index)
            .cloned()
            .ok_or_else(|| format!("FragmentInfo: Cannot get non-empty domain; Invalid dimension index {index}"))
    });
    match result {
        Ok(bytes) => {
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), domain.cast::<u8>(), bytes.len()) };
            TILEDB_OK
        }
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_fragment_info_get_non_empty_domain_from_index(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    did: u32,
    domain: *mut c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    unsafe { copy_domain(ctx, info, fid, |_| Ok(did as usize), domain) }
}

pub unsafe extern "C" fn tiledb_fragment_info_get_non_empty_domain_from_name(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    dim_name: *const c_char,
    domain: *mut c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    let name = sim_str!(ctx, dim_name, "dimension name");
    let lookup = |schema: &SchemaDef| {
        schema
            .dim_index(name)
            .ok_or_else(|| format!("FragmentInfo: Cannot get non-empty domain; Dimension '{name}' does not exist"))
    };
    unsafe { copy_domain(ctx, info, fid, lookup, domain) }
}

pub unsafe extern "C" fn tiledb_fragment_info_get_cell_num(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    cell_num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, cell_num, info.with_fragment(fid, |f, _| Ok(f.cells)))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_version(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    version: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, version, info.with_fragment(fid, |_, _| Ok(FORMAT_VERSION)))
}

pub unsafe extern "C" fn tiledb_fragment_info_has_consolidated_metadata(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    has: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, has, info.with_fragment(fid, |_, _| Ok(0)))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_unconsolidated_metadata_num(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    unconsolidated: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    fragment_out!(ctx, unconsolidated, info.fragment_num())
}

pub unsafe extern "C" fn tiledb_fragment_info_get_to_vacuum_num(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    to_vacuum_num: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    // Nothing is ever consolidated here, so nothing awaits vacuuming.
    fragment_out!(ctx, to_vacuum_num, info.fragment_num().map(|_| 0))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_to_vacuum_uri(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    _uri: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let _ = sim_arg!(ctx, fragment_info, "fragment info");
    ctx.fail(format!("FragmentInfo: Cannot get URI of fragment to vacuum {fid}; Index out of bounds"))
}

pub unsafe extern "C" fn tiledb_fragment_info_get_array_schema(
    ctx: *mut tiledb_ctx_t,
    fragment_info: *mut tiledb_fragment_info_t,
    fid: u32,
    array_schema: *mut *mut tiledb_array_schema_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let info = sim_arg!(ctx, fragment_info, "fragment info");
    match info.with_fragment(fid, |_, schema| Ok(schema.clone())) {
        Ok(schema) => {
            let schema = tiledb_array_schema_t::from_def(schema);
            sim_out!(ctx, array_schema, boxed(schema, "array_schema"));
            TILEDB_OK
        }
        Err(message) => ctx.fail(message),
    }
}

#[cfg(test)]
mod tests {
    use super::super::array::AttrData;
    use super::super::schema::DimensionDef;
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_summary_encodes_domain_in_dimension_type() {
        let schema = SchemaDef {
            array_type: TILEDB_DENSE,
            dims: vec![DimensionDef {
                name: "x".into(),
                datatype: TILEDB_INT32,
                domain: [0i32, 99].iter().flat_map(|v| v.to_ne_bytes()).collect(),
                tile_extent: None,
            }],
            attributes: Vec::new(),
            labels: Vec::new(),
            enumerations: Vec::new(),
        };
        let fragment = Fragment {
            uri: "mem://a/__fragments/__3_3_0".into(),
            timestamp: 3,
            ranges: vec![(5, 8)],
            cells: 4,
            data: BTreeMap::from([(
                "a".to_string(),
                AttrData {
                    values: vec![0; 16],
                    ..AttrData::default()
                },
            )]),
        };
        let summary = FragmentSummary::new(&fragment, &schema);
        let expected: Vec<u8> = [5i32, 8].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(summary.domain, vec![expected]);
        assert_eq!(summary.size, 16);
        assert_eq!(summary.cells, 4);
    }
}
